//! The scheduler: per-session bookkeeping of in-flight requests, node
//! assignment, result-cache short-circuiting, co-submission collapse, and
//! blocked-on-target cycle detection. Holds no transport of its own —
//! callers (the session event loop) turn its decisions into actual node
//! traffic.

use std::collections::{HashMap, HashSet};

use build_protocol::{BuildResult, NodeAffinity, NodeType, TargetResultCode};

use crate::caches::ResultsCache;
use crate::error::SchedulerError;
use crate::scheduler::affinity::NodeCountPolicy;

/// What the scheduler decided to do with a newly submitted root request.
pub enum SchedulingDecision {
    /// Answered entirely from the results cache; no node involved.
    Cached(BuildResult),
    /// An identical request is already in flight; attach to it instead of
    /// scheduling a duplicate.
    Collapsed { leader_global_request_id: i32 },
    /// Assigned to `node_id`, creating it first if `create_node` is set.
    Scheduled { global_request_id: i32, node_id: i32, create_node: Option<NodeType> },
}

struct InFlightRequest {
    node_id: i32,
    /// Every submission waiting on this request's result, leader included.
    submissions: Vec<i32>,
}

#[derive(Default)]
pub struct Scheduler {
    policy_max_node_count: u32,
    next_node_id: i32,
    next_global_request_id: i32,
    inproc_node: Option<i32>,
    outofproc_nodes: HashSet<i32>,
    node_busy: HashSet<i32>,
    in_flight: HashMap<i32, InFlightRequest>,
    /// configuration_id -> the node already assigned to it. Requests for a
    /// configuration always serialize onto that same node rather than
    /// spawning a second one, even when their target sets differ enough that
    /// `collapse_index` doesn't fire.
    config_to_node: HashMap<i32, i32>,
    /// (configuration_id, sorted target list) -> the leader request already
    /// building that exact work, for co-submission collapse.
    collapse_index: HashMap<(i32, Vec<String>), i32>,
    /// blocked global request id -> the global request ids it is waiting on.
    blocked_on: HashMap<i32, Vec<i32>>,
}

impl Scheduler {
    pub fn new(max_node_count: u32) -> Self {
        Scheduler { policy_max_node_count: max_node_count.max(1), next_node_id: 1, next_global_request_id: 1, ..Default::default() }
    }

    fn policy(&self) -> NodeCountPolicy {
        NodeCountPolicy { max_node_count: self.policy_max_node_count }
    }

    pub fn next_global_request_id(&mut self) -> i32 {
        let id = self.next_global_request_id;
        self.next_global_request_id += 1;
        id
    }

    /// The result-cache fast path. A previously failed target is only
    /// replayed as-is (without rescheduling) when `skip_unsuccessful` is
    /// set; otherwise a failure forces a real rebuild.
    pub fn try_cache_fast_path(&self, configuration_id: i32, targets: &[String], skip_unsuccessful: bool, results_cache: &ResultsCache) -> Option<BuildResult> {
        let cached = results_cache.lookup_for_replay(configuration_id, targets)?;
        let any_failed = cached.per_target.values().any(|r| r.code == TargetResultCode::Failure);
        if any_failed && !skip_unsuccessful {
            None
        } else {
            Some(cached)
        }
    }

    fn collapse_key(configuration_id: i32, targets: &[String]) -> (i32, Vec<String>) {
        let mut sorted = targets.to_vec();
        sorted.sort();
        (configuration_id, sorted)
    }

    /// Submits a root request on behalf of `submission_id`. Caller has
    /// already checked the cache fast path; this handles collapse and node
    /// assignment.
    pub fn submit_root_request(
        &mut self,
        submission_id: i32,
        configuration_id: i32,
        targets: Vec<String>,
        affinity: NodeAffinity,
    ) -> SchedulingDecision {
        let key = Self::collapse_key(configuration_id, &targets);
        if let Some(&leader) = self.collapse_index.get(&key) {
            if let Some(in_flight) = self.in_flight.get_mut(&leader) {
                in_flight.submissions.push(submission_id);
                return SchedulingDecision::Collapsed { leader_global_request_id: leader };
            }
        }

        let global_request_id = self.next_global_request_id();
        let (node_id, create_node) = self.assign_node(affinity, configuration_id);
        self.in_flight.insert(global_request_id, InFlightRequest { node_id, submissions: vec![submission_id] });
        self.collapse_index.insert(key, global_request_id);
        self.config_to_node.insert(configuration_id, node_id);
        self.node_busy.insert(node_id);
        SchedulingDecision::Scheduled { global_request_id, node_id, create_node }
    }

    fn total_node_count(&self) -> u32 {
        self.inproc_node.is_some() as u32 + self.outofproc_nodes.len() as u32
    }

    fn assign_out_of_proc_node(&mut self) -> (i32, Option<NodeType>) {
        if let Some(&free) = self.outofproc_nodes.iter().find(|id| !self.node_busy.contains(*id)) {
            return (free, None);
        }
        if self.policy().can_create_out_of_proc_node(self.total_node_count()) {
            let id = self.next_node_id;
            self.next_node_id += 1;
            self.outofproc_nodes.insert(id);
            (id, Some(NodeType::OutOfProc))
        } else {
            // Capacity exhausted: queue onto an existing node anyway
            // rather than exceeding the cap: callers observe
            // increased latency, never a correctness issue, since
            // each node still processes one request at a time.
            let any = *self.outofproc_nodes.iter().next().expect("at least one node exists once the cap is reached");
            (any, None)
        }
    }

    fn assign_node(&mut self, affinity: NodeAffinity, configuration_id: i32) -> (i32, Option<NodeType>) {
        if let Some(&node_id) = self.config_to_node.get(&configuration_id) {
            return (node_id, None);
        }
        match affinity {
            NodeAffinity::InProc => match self.inproc_node {
                Some(id) => (id, None),
                None => {
                    let id = self.next_node_id;
                    self.next_node_id += 1;
                    self.inproc_node = Some(id);
                    (id, Some(NodeType::InProc))
                }
            },
            NodeAffinity::Any => {
                if let Some(id) = self.inproc_node {
                    if !self.node_busy.contains(&id) {
                        return (id, None);
                    }
                }
                self.assign_out_of_proc_node()
            }
            NodeAffinity::OutOfProc => self.assign_out_of_proc_node(),
        }
    }

    /// Records that `blocked` cannot proceed until `blocking` completes.
    /// Rejects the registration if it would close a cycle.
    pub fn register_block_on(&mut self, blocked: i32, blocking: i32) -> Result<(), SchedulerError> {
        if blocked == blocking || self.reaches(blocking, blocked) {
            return Err(SchedulerError::CircularDependency(vec![blocked, blocking]));
        }
        self.blocked_on.entry(blocked).or_default().push(blocking);
        Ok(())
    }

    fn reaches(&self, start: i32, target: i32) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(next) = self.blocked_on.get(&id) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// Marks a request complete, frees its node, and returns every
    /// submission id (leader plus any collapsed co-submissions) that should
    /// receive the result.
    pub fn complete_request(&mut self, global_request_id: i32) -> Vec<i32> {
        self.blocked_on.remove(&global_request_id);
        match self.in_flight.remove(&global_request_id) {
            Some(info) => {
                self.node_busy.remove(&info.node_id);
                info.submissions
            }
            None => Vec::new(),
        }
    }
}
