//! Error taxonomy for the build orchestration core (Section 7).
//!
//! `thiserror` gives each domain a typed enum callers can match on, per the
//! spec's explicit requirement that user errors, target failures,
//! cancellation, internal invariant violations and transport errors are
//! distinguishable — rather than the single boxed `dyn Error` alias the
//! teacher crate uses for its own top-level plumbing.

use thiserror::Error;

/// The kind of invalid state transition a `BuildManager` call was attempted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperationKind {
    BeginBuildWhileBuilding,
    PendRequestWhileIdle,
    BuildRequestWhileIdle,
    EndBuildWhileIdle,
}

#[derive(Debug, Error)]
pub enum BuildManagerError {
    #[error("invalid operation: {kind:?} (session was {state})")]
    InvalidOperation { kind: InvalidOperationKind, state: &'static str },

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Transport(#[from] NodeProtocolError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("circular dependency detected among in-flight requests: {0:?}")]
    CircularDependency(Vec<i32>),

    #[error("no live configuration for id {0}")]
    UnknownConfiguration(i32),

    #[error("request {0} has zero targets and the project has no default targets")]
    NoTargetsSpecified(i32),
}

#[derive(Debug, Error)]
pub enum NodeProtocolError {
    #[error("node {0} shut down unexpectedly")]
    NodeShutdown(i32),

    #[error("node connection timed out after {0}ms")]
    ConnectionTimeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum UpToDateError {
    #[error("i/o error reading timestamp for {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

pub type Result<T, E = BuildManagerError> = std::result::Result<T, E>;
