//! Host-supplied configuration for a `BuildManager`, captured once and held
//! for the manager's lifetime.

use std::path::PathBuf;

use crate::environment::EnvironmentSnapshot;

#[derive(Debug, Clone)]
pub struct BuildParameters {
    pub max_node_count: u32,
    /// Forces every out-of-proc-eligible request out of process, regardless
    /// of the `MSBUILDFORCEALLTASKSOUTOFPROC` environment variable (which is
    /// folded into `environment` instead and applies independently).
    pub force_out_of_proc: bool,
    pub environment: EnvironmentSnapshot,
    /// The executable out-of-process nodes run. Defaults to the current
    /// process's own binary (self-dispatch, `--node-worker <id>`); a test
    /// harness or an embedder that ships a dedicated node executable can
    /// point this elsewhere.
    pub worker_binary: Option<PathBuf>,
}

impl BuildParameters {
    pub fn new(max_node_count: u32) -> Self {
        BuildParameters { max_node_count, force_out_of_proc: false, environment: EnvironmentSnapshot::capture(), worker_binary: None }
    }

    pub fn effective_force_out_of_proc(&self) -> bool {
        self.force_out_of_proc || self.environment.force_all_tasks_out_of_proc
    }
}

impl Default for BuildParameters {
    fn default() -> Self {
        BuildParameters::new(num_cpus_fallback())
    }
}

fn num_cpus_fallback() -> u32 {
    std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1)
}
