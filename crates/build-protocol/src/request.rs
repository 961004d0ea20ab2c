//! An in-flight unit of work dispatched between the session and a node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request_data::HostServices;

/// A map describing proxied target aliases: alias name -> real target name.
/// Carried by a `BuildRequest` instead of a target list when the request is
/// a proxy-target request (always `InProc` affinity, per the scheduler's
/// affinity-resolution rule).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyTargets {
    pub aliases: BTreeMap<String, String>,
}

/// Either a concrete ordered target list, or a `ProxyTargets` alias map.
/// Never both — enforced by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestTargets {
    Targets(Vec<String>),
    Proxy(ProxyTargets),
}

impl RequestTargets {
    pub fn as_targets(&self) -> Option<&[String]> {
        match self {
            RequestTargets::Targets(t) => Some(t),
            RequestTargets::Proxy(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, RequestTargets::Proxy(_))
    }
}

/// An in-flight unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub submission_id: i32,
    /// Unique within the session.
    pub node_request_id: i32,
    pub configuration_id: i32,
    pub targets: RequestTargets,
    /// The request that caused this one to be scheduled, if nested.
    pub parent_global_request_id: Option<i32>,
    pub host_services: HostServices,
}

impl BuildRequest {
    pub fn is_root(&self) -> bool {
        self.parent_global_request_id.is_none()
    }
}
