//! The worker-side loop a node runs: single-threaded cooperative execution
//! of one `BuildRequest` at a time, suspending on a `BuildRequestBlocker`
//! when a target needs nested builds and resuming once the scheduler sends
//! a `BuildRequestUnblocker` back.

use std::sync::Arc;

use build_protocol::{
    BuildRequest, BuildRequestBlocker, BuildRequestConfiguration, BuildResult, NodeAffinity, NodePacket, OverallResultCode,
    RequestTargets, TargetResultCode,
};
use log::{info, warn};

use crate::node::transport::NodeTransport;
use crate::project::{ExecutionOutcome, TargetExecutor};

/// Runs until the transport yields `NodePacket::Shutdown` or disconnects.
/// `node_id` is echoed into log lines so the scheduler side can attribute
/// them when debugging.
pub fn run_node_worker(node_id: i32, transport: &dyn NodeTransport, executor: Arc<dyn TargetExecutor>) {
    loop {
        let packet = match transport.recv() {
            Ok(p) => p,
            Err(_) => {
                info!("node {node_id} transport closed, exiting worker loop");
                return;
            }
        };

        match packet {
            NodePacket::Request(request) => {
                let result = execute_request(&request, transport, executor.as_ref());
                if let Err(err) = transport.send(NodePacket::Result(result)) {
                    warn!("node {node_id} failed to report result: {err}");
                    return;
                }
            }
            NodePacket::Shutdown { reason } => {
                info!("node {node_id} shutting down: {reason}");
                return;
            }
            other => {
                warn!("node {node_id} received unexpected packet {:?}", other.packet_type());
            }
        }
    }
}

fn execute_request(request: &BuildRequest, transport: &dyn NodeTransport, executor: &dyn TargetExecutor) -> BuildResult {
    let mut result = BuildResult::new(request.configuration_id);
    let Some(targets) = request.targets.as_targets() else {
        // Proxy-target requests carry no direct work of their own; the
        // scheduler resolves aliases before ever handing one to a node.
        return result;
    };

    // Negative ids, unique within this one request's lifetime, identify
    // configurations this node materialized for P2P children before the
    // scheduler has assigned them an authoritative id.
    let mut next_local_config_id = -1;

    for target in targets {
        let mut known_children: Vec<BuildResult> = Vec::new();
        loop {
            let outcome = executor.execute(target, request.configuration_id, &known_children);
            match outcome {
                ExecutionOutcome::Complete(target_result) => {
                    let failed = target_result.code == TargetResultCode::Failure;
                    result.per_target.insert(target.clone(), target_result);
                    if failed {
                        // A failed target stops the rest of this request's
                        // target list from running, same request.
                        result.overall_result = OverallResultCode::Failure;
                        return result;
                    }
                    break;
                }
                ExecutionOutcome::NeedsChildren(children) => {
                    let mut child_requests = Vec::with_capacity(children.len());
                    for (i, data) in children.iter().enumerate() {
                        let mut config = BuildRequestConfiguration::new(
                            data.project_full_path.clone(),
                            data.tools_version.clone().unwrap_or_else(|| "Current".to_string()),
                            data.global_properties.clone(),
                            NodeAffinity::Any,
                        );
                        config.assign_id(next_local_config_id);
                        next_local_config_id -= 1;
                        let configuration_id = config.id();
                        if transport.send(NodePacket::Configuration(config)).is_err() {
                            result.set_failed("transport closed while registering child configuration");
                            return result;
                        }
                        child_requests.push(BuildRequest {
                            submission_id: request.submission_id,
                            node_request_id: request.node_request_id * 1000 + i as i32,
                            configuration_id,
                            targets: RequestTargets::Targets(data.targets.clone()),
                            parent_global_request_id: Some(request.node_request_id),
                            host_services: data.host_services.clone(),
                        });
                    }
                    let blocker = BuildRequestBlocker::on_children(request.node_request_id, child_requests);
                    if transport.send(NodePacket::Blocker(blocker)).is_err() {
                        result.set_failed("transport closed while awaiting nested build");
                        return result;
                    }
                    match transport.recv() {
                        Ok(NodePacket::Unblocker(unblocker)) => {
                            known_children.extend(unblocker.results);
                        }
                        _ => {
                            result.set_failed("expected unblocker packet after blocker");
                            return result;
                        }
                    }
                }
            }
        }
    }
    result
}
