//! Worker <-> scheduler coordination packets for nested builds.

use serde::{Deserialize, Serialize};

use crate::request::BuildRequest;
use crate::result::BuildResult;

/// A worker -> scheduler packet indicating a request cannot continue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequestBlocker {
    pub blocked_global_request_id: i32,
    /// Child requests that must complete before the blocked request can
    /// continue. Empty when blocking on a target instead (see below).
    pub child_requests: Vec<BuildRequest>,
    /// Set when the block is on another in-flight request reaching a
    /// particular target, rather than on unbuilt child requests.
    pub blocking_target: Option<BlockingTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingTarget {
    pub blocking_global_request_id: i32,
    pub target_name: String,
    /// Partial result accumulated so far on the blocked request, carried so
    /// the scheduler can still serve result-cache lookups for already
    /// completed targets.
    pub partial_result: BuildResult,
}

impl BuildRequestBlocker {
    pub fn on_children(blocked_global_request_id: i32, child_requests: Vec<BuildRequest>) -> Self {
        BuildRequestBlocker { blocked_global_request_id, child_requests, blocking_target: None }
    }

    pub fn on_target(blocked_global_request_id: i32, blocking_target: BlockingTarget) -> Self {
        BuildRequestBlocker { blocked_global_request_id, child_requests: Vec::new(), blocking_target: Some(blocking_target) }
    }
}

/// Scheduler -> worker packet that unblocks a previously-blocked request,
/// carrying the results of the requests it was waiting on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequestUnblocker {
    pub unblocked_global_request_id: i32,
    pub results: Vec<BuildResult>,
}
