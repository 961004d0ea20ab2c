//! A host's handle to one pending or completed submission.

use build_protocol::BuildResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Pending,
    Dispatched { global_request_id: i32 },
    Completed,
}

pub struct Submission {
    pub id: i32,
    pub(crate) state: SubmissionState,
    pub(crate) result: Option<BuildResult>,
}

impl Submission {
    pub fn is_complete(&self) -> bool {
        matches!(self.state, SubmissionState::Completed)
    }

    pub fn result(&self) -> Option<&BuildResult> {
        self.result.as_ref()
    }
}
