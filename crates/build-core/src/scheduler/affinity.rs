//! Node-affinity resolution and the node-count policy.
//!
//! Rules, in priority order:
//! 1. A proxy-target request always runs in-proc, regardless of its
//!    configuration's declared affinity.
//! 2. `MSBUILDNOINPROCNODE` downgrades `Any` and `InProc` alike to
//!    `OutOfProc` — no in-proc node may ever be created for the session.
//! 3. The session-wide force-out-of-proc override (independent of the
//!    environment variable above) promotes an explicit `InProc` request to
//!    `OutOfProc`.
//! 4. Otherwise the configuration's own declared affinity governs.
//! 5. Node count is capped at `max_node_count`; at most one in-proc node
//!    ever exists per session (it is a singleton, never pooled).

use build_protocol::NodeAffinity;

use crate::environment::EnvironmentSnapshot;

pub fn resolve_affinity(declared: NodeAffinity, is_proxy_target: bool, force_out_of_proc: bool, env: &EnvironmentSnapshot) -> NodeAffinity {
    if is_proxy_target {
        return NodeAffinity::InProc;
    }
    if env.no_in_proc_node {
        return NodeAffinity::OutOfProc;
    }
    if force_out_of_proc && declared == NodeAffinity::InProc {
        return NodeAffinity::OutOfProc;
    }
    declared
}

pub struct NodeCountPolicy {
    pub max_node_count: u32,
}

impl NodeCountPolicy {
    /// Whether a new out-of-process node may still be created given the
    /// total number of live nodes, in-proc singleton included: spec's cap is
    /// on inproc + oop together, not on the out-of-process pool alone.
    pub fn can_create_out_of_proc_node(&self, current_total_node_count: u32) -> bool {
        current_total_node_count < self.max_node_count.max(1)
    }
}
