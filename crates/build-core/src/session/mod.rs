//! The `BuildManager` session lifecycle: parameters, the manager itself, a
//! caller's handle to a pending submission, and the graph-build variant's
//! static cycle check.

mod graph;
mod manager;
mod parameters;
mod submission;

pub use graph::{validate_no_static_cycles, ProjectGraphNode};
pub use manager::BuildManager;
pub use parameters::BuildParameters;
pub use submission::{Submission, SubmissionState};
