//! Logging events forwarded across the node protocol.
//!
//! Replaces the source system's dynamic type injection (arbitrary logging
//! event subclasses) with a tagged variant of known kinds plus a generic
//! "custom-typed" payload, per the Design Notes re-architecture guidance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    High,
    Normal,
    Low,
}

/// A known, well-typed logging event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogEventPayload {
    Message { text: String, importance: Importance },
    ProjectStarted { project_path: String, initial_properties: BTreeMap<String, String> },
    ProjectFinished { project_path: String, succeeded: bool },
    ProjectEvaluationStarted { project_path: String },
    ProjectEvaluationFinished { project_path: String, properties: BTreeMap<String, String> },
    TargetAlreadyComplete { target_name: String, succeeded: bool },
    Warning { code: String, text: String },
    Error { code: String, text: String },
    /// A subclass of logging event that could not be represented by a known
    /// kind. Carries a serialized payload and a type tag for whichever
    /// consumer understands it; otherwise treated as an opaque message.
    Custom { type_tag: String, message: String, payload: Vec<u8> },
}

/// A node -> scheduler logging packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub node_id: i32,
    pub global_request_id: Option<i32>,
    pub payload: LogEventPayload,
}

impl LogEventPayload {
    /// Whether this event's serialization survived as its original typed
    /// variant, versus having been substituted with a synthesized
    /// "ExpectedEventToBeSerializable" warning + base message. Custom events
    /// whose `payload` is empty indicate the latter (i.e. the subclass was
    /// dropped and only `message` carries content).
    pub fn was_substituted(&self) -> bool {
        matches!(self, LogEventPayload::Custom { payload, .. } if payload.is_empty())
    }
}
