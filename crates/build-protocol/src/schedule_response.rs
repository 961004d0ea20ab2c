//! Scheduler -> transport instructions.
//!
//! The in-process `Scheduler` (see `build-core::scheduler`) decides via its
//! own `SchedulingDecision` enum rather than this type, since scheduler and
//! session share a process and have no transport to serialize across. This
//! type is the wire-shaped equivalent the data model names for a scheduler
//! that does sit behind a transport boundary (remote or out-of-process),
//! and is kept for that completeness.

use serde::{Deserialize, Serialize};

use crate::request::BuildRequest;
use crate::result::BuildResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    InProc,
    OutOfProc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleResponse {
    /// Send `request` to node `node_id`.
    ScheduleWithConfiguration { node_id: i32, request: BuildRequest },
    /// Hand a cached (or collapsed-follower) result back to a parent request
    /// without touching a node.
    ReportResults { global_request_id: i32, result: BuildResult },
    /// Unblock a parent request whose children have all completed.
    ResumeExecution { global_request_id: i32 },
    /// Instruct a node provider to spawn more nodes of the given type.
    CreateNode { node_type: NodeType, number_of_nodes_to_create: u32 },
}
