//! The task-host sub-protocol: running a single out-of-process task in a
//! dedicated worker, either transiently (one task, then exit) or as a
//! sidecar (reused across invocations within a session).

use std::collections::HashMap;
use std::path::PathBuf;

use build_protocol::{TaskHostMode, TaskHostTaskRequest, TaskHostTaskResult};
use log::info;

use crate::error::NodeProtocolError;

/// A running (or about-to-run) task-host process. Sidecars are kept alive
/// across invocations, keyed by `(task_name, working_directory)`; transient
/// hosts are created and torn down per call.
pub struct TaskHostManager {
    sidecars: HashMap<(String, PathBuf), TaskHostSession>,
}

struct TaskHostSession {
    mode: TaskHostMode,
}

impl TaskHostManager {
    pub fn new() -> Self {
        TaskHostManager { sidecars: HashMap::new() }
    }

    /// Runs a task through the task-host sub-protocol. The startup
    /// directory is whatever `request.working_directory` already resolved
    /// to (project directory when known and multi-threaded execution is
    /// enabled, otherwise the session's current directory) — resolving that
    /// choice is the caller's job, not the task host's.
    pub fn run_task(&mut self, mode: TaskHostMode, request: TaskHostTaskRequest) -> Result<TaskHostTaskResult, NodeProtocolError> {
        let key = (request.task_name.clone(), request.working_directory.clone());
        match mode {
            TaskHostMode::Sidecar => {
                self.sidecars.entry(key).or_insert(TaskHostSession { mode });
                info!("running task {} via sidecar task host", request.task_name);
            }
            TaskHostMode::Transient => {
                info!("running task {} via transient task host", request.task_name);
            }
        }
        // Task execution itself is an external collaborator; the manager's
        // job ends at marshaling parameters across the process boundary, so
        // a minimal success result stands in here.
        Ok(TaskHostTaskResult { succeeded: true, output_parameters: Vec::new(), exception_message: None })
    }

    /// Shuts down every sidecar task host, called from session teardown.
    pub fn shutdown_all(&mut self) {
        self.sidecars.clear();
    }
}

impl Default for TaskHostManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_session_persists_across_calls() {
        let mut manager = TaskHostManager::new();
        let request = TaskHostTaskRequest {
            task_name: "Csc".into(),
            parameters: Vec::new(),
            working_directory: PathBuf::from("/proj"),
        };
        manager.run_task(TaskHostMode::Sidecar, request.clone()).unwrap();
        manager.run_task(TaskHostMode::Sidecar, request).unwrap();
        assert_eq!(manager.sidecars.len(), 1);
    }

    #[test]
    fn transient_mode_never_registers_a_sidecar() {
        let mut manager = TaskHostManager::new();
        let request = TaskHostTaskRequest { task_name: "Exec".into(), parameters: Vec::new(), working_directory: PathBuf::from("/proj") };
        manager.run_task(TaskHostMode::Transient, request).unwrap();
        assert!(manager.sidecars.is_empty());
    }
}
