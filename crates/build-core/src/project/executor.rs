//! The pluggable seam where actual task execution happens. Concrete tasks
//! (Csc, Copy, Exec, ...) are external collaborators per scope — only this
//! interface matters here.

use build_protocol::{BuildRequestData, BuildResult, TargetResult};

/// What running a single target produced.
pub enum ExecutionOutcome {
    /// The target ran to completion (successfully or not).
    Complete(TargetResult),
    /// The target cannot proceed until the given child projects have been
    /// built (a P2P reference task). The worker issues a
    /// `BuildRequestBlocker` and resumes this target once results for the
    /// children are available, passing them back through
    /// `execute`'s `known_child_results`.
    NeedsChildren(Vec<BuildRequestData>),
}

pub trait TargetExecutor: Send + Sync {
    /// `configuration_id` identifies which configuration to run the target
    /// against; the executor is expected to resolve the full configuration
    /// (properties, evaluated project state) from its own store, since that
    /// state is not re-sent to a node on every request.
    fn execute(
        &self,
        target: &str,
        configuration_id: i32,
        known_child_results: &[BuildResult],
    ) -> ExecutionOutcome;
}

/// A default executor that succeeds every target immediately with no
/// output items. Used by out-of-process worker nodes, where a real host
/// would instead load task assemblies dynamically into the child process —
/// out of scope here.
pub struct NoOpExecutor;

impl TargetExecutor for NoOpExecutor {
    fn execute(&self, _target: &str, _configuration_id: i32, _known_child_results: &[BuildResult]) -> ExecutionOutcome {
        ExecutionOutcome::Complete(TargetResult::success(vec![]))
    }
}
