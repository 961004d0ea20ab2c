//! The node protocol: typed message passing between the scheduler and a
//! worker node (in-process or out-of-process).

use serde::{Deserialize, Serialize};

use crate::blocker::{BuildRequestBlocker, BuildRequestUnblocker};
use crate::configuration::BuildRequestConfiguration;
use crate::logging::LogMessage;
use crate::request::BuildRequest;
use crate::result::BuildResult;

/// Tag identifying which variant a `NodePacket` carries, kept distinct from
/// the Rust enum discriminant so the wire form is stable across versions
/// (mirrors the source protocol's explicit `NodePacketType` byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodePacketType {
    BuildRequestConfiguration,
    BuildRequest,
    BuildResult,
    BuildRequestBlocker,
    BuildRequestUnblocker,
    LogMessage,
    NodeShutdown,
    TaskHostConfiguration,
    TaskHostTaskRequest,
    TaskHostTaskResult,
}

/// A single message exchanged over the node transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodePacket {
    Configuration(BuildRequestConfiguration),
    Request(BuildRequest),
    Result(BuildResult),
    Blocker(BuildRequestBlocker),
    Unblocker(BuildRequestUnblocker),
    Log(LogMessage),
    Shutdown { reason: String },
}

impl NodePacket {
    pub fn packet_type(&self) -> NodePacketType {
        match self {
            NodePacket::Configuration(_) => NodePacketType::BuildRequestConfiguration,
            NodePacket::Request(_) => NodePacketType::BuildRequest,
            NodePacket::Result(_) => NodePacketType::BuildResult,
            NodePacket::Blocker(_) => NodePacketType::BuildRequestBlocker,
            NodePacket::Unblocker(_) => NodePacketType::BuildRequestUnblocker,
            NodePacket::Log(_) => NodePacketType::LogMessage,
            NodePacket::Shutdown { .. } => NodePacketType::NodeShutdown,
        }
    }
}
