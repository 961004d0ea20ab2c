//! `BuildManager`: the session-lifecycle entry point. Owns the config and
//! results caches across builds, and drives one `BuildSession`'s event loop
//! while `Building`.
//!
//! Grounded in `GlobalState::run`'s single-threaded `select!` loop: every
//! node's inbound packets funnel through one shared channel (see
//! [`crate::node::NodeHandle`]), so the loop here is a single blocking
//! `recv` no matter how many nodes are active.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use build_protocol::{
    BuildRequest, BuildRequestBlocker, BuildRequestConfiguration, BuildRequestData, BuildRequestUnblocker, BuildResult,
    LogEventPayload, NodeAffinity, NodePacket, NodeType, RequestTargets, TargetResultCode,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};

use crate::caches::{ConfigCache, ResultsCache};
use crate::error::{BuildManagerError, InvalidOperationKind, Result, SchedulerError};
use crate::node::{InProcNodeProvider, NodeHandle, NodeProvider, OutOfProcNodeProvider};
use crate::project::{ProjectInstance, TargetExecutor};
use crate::scheduler::{resolve_affinity, Scheduler, SchedulingDecision};
use crate::session::parameters::BuildParameters;
use crate::session::submission::{Submission, SubmissionState};
use crate::task_host::TaskHostManager;

/// One node's request is blocked on a set of child requests; accumulates
/// their results until all have reported, then unblocks the node.
struct PendingBlock {
    node_id: i32,
    remaining: HashSet<i32>,
    collected: Vec<BuildResult>,
}

struct BuildSession {
    scheduler: Scheduler,
    nodes: HashMap<i32, NodeHandle>,
    /// Which global request id a node is currently executing, so a bare
    /// `NodePacket::Result` (carrying only a configuration id) can be
    /// attributed back to the request that produced it.
    node_running: HashMap<i32, i32>,
    events_tx: Sender<(i32, NodePacket)>,
    events_rx: Receiver<(i32, NodePacket)>,
    inproc_provider: InProcNodeProvider,
    outofproc_provider: Option<OutOfProcNodeProvider>,
    /// Real, host-visible submissions.
    submissions: HashMap<i32, Submission>,
    /// Nested-build waiters: a parent request blocked on these child global
    /// request ids.
    pending_blocks: HashMap<i32, PendingBlock>,
    /// Negative configuration ids a node invented for its children, remapped
    /// to the session's canonical id once registered. Scoped per node since
    /// the negative ids are only unique within one node.
    config_remap: HashMap<(i32, i32), i32>,
    next_waiter_id: i32,
    cancelled: bool,
}

pub struct BuildManager {
    parameters: BuildParameters,
    config_cache: ConfigCache,
    results_cache: ResultsCache,
    task_host: TaskHostManager,
    project_instances: HashMap<PathBuf, ProjectInstance>,
    executor: Arc<dyn TargetExecutor>,
    session_id: u64,
    session: Option<BuildSession>,
}

/// Process-wide counter handing each `BuildManager` its own disk-cache
/// subdirectory, so sibling managers in the same process never collide on
/// `reset_caches`.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Logs a `TargetAlreadyComplete` event for every target in a cache-hit
/// replay, per the skip-unsuccessful-replay contract: a submission that
/// reuses another session's (or another reference's) results still reports
/// per-target completion, it just never re-runs anything.
fn log_cached_replay(configuration_id: i32, cached: &BuildResult) {
    for (target_name, target_result) in &cached.per_target {
        let payload = LogEventPayload::TargetAlreadyComplete {
            target_name: target_name.clone(),
            succeeded: target_result.code != TargetResultCode::Failure,
        };
        info!("configuration {configuration_id} log: {:?}", payload);
    }
}

impl BuildManager {
    pub fn new(parameters: BuildParameters, executor: Arc<dyn TargetExecutor>) -> Self {
        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        BuildManager {
            config_cache: ConfigCache::new(session_id, std::env::temp_dir()),
            results_cache: ResultsCache::new(),
            task_host: TaskHostManager::new(),
            project_instances: HashMap::new(),
            executor,
            parameters,
            session_id,
            session: None,
        }
    }

    pub fn register_project_instance(&mut self, instance: ProjectInstance) {
        self.project_instances.insert(instance.full_path.clone(), instance);
    }

    pub fn get_project_instance_for_build(&self, full_path: &std::path::Path) -> Option<&ProjectInstance> {
        self.project_instances.get(full_path)
    }

    fn require_building(&mut self) -> Result<&mut BuildSession> {
        self.session.as_mut().ok_or(BuildManagerError::InvalidOperation {
            kind: InvalidOperationKind::BuildRequestWhileIdle,
            state: "Idle",
        })
    }

    pub fn begin_build(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(BuildManagerError::InvalidOperation {
                kind: InvalidOperationKind::BeginBuildWhileBuilding,
                state: "Building",
            });
        }
        info!("begin build (session {})", self.session_id);
        self.session_id += 1;
        let (events_tx, events_rx) = unbounded();
        self.session = Some(BuildSession {
            scheduler: Scheduler::new(self.parameters.max_node_count),
            nodes: HashMap::new(),
            node_running: HashMap::new(),
            events_tx,
            events_rx,
            inproc_provider: InProcNodeProvider::new(Arc::clone(&self.executor)),
            outofproc_provider: match &self.parameters.worker_binary {
                Some(path) => Some(OutOfProcNodeProvider::new(path.clone())),
                None => OutOfProcNodeProvider::current_exe_worker().ok(),
            },
            submissions: HashMap::new(),
            pending_blocks: HashMap::new(),
            config_remap: HashMap::new(),
            next_waiter_id: 1,
            cancelled: false,
        });
        Ok(())
    }

    /// Submits a build request without waiting for it, returning its
    /// submission id. Call `build_request` to block for the result.
    pub fn pend_build_request(&mut self, mut data: BuildRequestData) -> Result<i32> {
        if self.session.is_none() {
            return Err(BuildManagerError::InvalidOperation {
                kind: InvalidOperationKind::PendRequestWhileIdle,
                state: "Idle",
            });
        }
        data.normalize_path(&std::env::current_dir().unwrap_or_default());
        let targets = if data.targets.is_empty() {
            self.project_instances
                .get(&data.project_full_path)
                .map(|p| p.default_targets.clone())
                .filter(|t| !t.is_empty())
                .ok_or(SchedulerError::NoTargetsSpecified(0))?
        } else {
            data.targets.clone()
        };

        let mut configuration = BuildRequestConfiguration::new(
            data.project_full_path.clone(),
            data.tools_version.clone().unwrap_or_else(|| "Current".to_string()),
            data.global_properties.clone(),
            data.host_services.affinity.unwrap_or_default(),
        );
        configuration.apply_force_out_of_proc(self.parameters.effective_force_out_of_proc());
        let configuration_id = self.config_cache.add_or_get_existing(configuration);
        let declared_affinity = self.config_cache.get(configuration_id).expect("just inserted").affinity;

        if let Some(cached) = self.session.as_ref().unwrap().scheduler.try_cache_fast_path(
            configuration_id,
            &targets,
            false,
            &self.results_cache,
        ) {
            log_cached_replay(configuration_id, &cached);
            let session = self.session.as_mut().unwrap();
            let waiter_id = session.next_waiter_id;
            session.next_waiter_id += 1;
            session.submissions.insert(waiter_id, Submission { id: waiter_id, state: SubmissionState::Completed, result: Some(cached) });
            return Ok(waiter_id);
        }

        let affinity = resolve_affinity(declared_affinity, false, self.parameters.effective_force_out_of_proc(), &self.parameters.environment);

        let session = self.session.as_mut().unwrap();
        let waiter_id = session.next_waiter_id;
        session.next_waiter_id += 1;
        let decision = session.scheduler.submit_root_request(waiter_id, configuration_id, targets.clone(), affinity);

        match decision {
            SchedulingDecision::Cached(result) => {
                session.submissions.insert(waiter_id, Submission { id: waiter_id, state: SubmissionState::Completed, result: Some(result) });
            }
            SchedulingDecision::Collapsed { leader_global_request_id } => {
                session.submissions.insert(
                    waiter_id,
                    Submission { id: waiter_id, state: SubmissionState::Dispatched { global_request_id: leader_global_request_id }, result: None },
                );
            }
            SchedulingDecision::Scheduled { global_request_id, node_id, create_node } => {
                let request = BuildRequest {
                    submission_id: waiter_id,
                    node_request_id: global_request_id,
                    configuration_id,
                    targets: RequestTargets::Targets(targets),
                    parent_global_request_id: None,
                    host_services: data.host_services.clone(),
                };
                Self::dispatch(session, node_id, create_node, request)?;
                session.submissions.insert(
                    waiter_id,
                    Submission { id: waiter_id, state: SubmissionState::Dispatched { global_request_id }, result: None },
                );
            }
        }
        Ok(waiter_id)
    }

    /// Creates `node_id` if `create_node` is set, then sends `request` to it.
    fn dispatch(session: &mut BuildSession, node_id: i32, create_node: Option<NodeType>, request: BuildRequest) -> Result<()> {
        if let Some(node_type) = create_node {
            let handle = match node_type {
                NodeType::InProc => session.inproc_provider.create_node(node_id, session.events_tx.clone()),
                NodeType::OutOfProc => session
                    .outofproc_provider
                    .as_mut()
                    .expect("out-of-process provider available")
                    .create_node(node_id, session.events_tx.clone()),
            }
            .map_err(BuildManagerError::from)?;
            session.nodes.insert(node_id, handle);
        }
        session.node_running.insert(node_id, request.node_request_id);
        session.nodes[&node_id].send(NodePacket::Request(request)).map_err(BuildManagerError::from)
    }

    /// Blocks until `submission_id`'s result is available, pumping the
    /// session's event loop in the meantime.
    pub fn build_request(&mut self, submission_id: i32) -> Result<BuildResult> {
        loop {
            {
                let session = self.require_building()?;
                if let Some(submission) = session.submissions.get(&submission_id) {
                    if submission.is_complete() {
                        return Ok(submission.result().cloned().expect("completed submission carries a result"));
                    }
                }
            }
            self.pump_one_event()?;
        }
    }

    /// Convenience wrapper: begins a build if idle, submits, waits, leaves
    /// the session open for further submissions.
    pub fn build(&mut self, data: BuildRequestData) -> Result<BuildResult> {
        if self.session.is_none() {
            self.begin_build()?;
        }
        let id = self.pend_build_request(data)?;
        self.build_request(id)
    }

    fn pump_one_event(&mut self) -> Result<()> {
        let (node_id, packet) = {
            let session = self.require_building()?;
            session.events_rx.recv().map_err(|_| BuildManagerError::InternalError("event channel closed".into()))?
        };

        match packet {
            NodePacket::Configuration(config) => {
                let local_id = if config.is_assigned() { config.id() } else { 0 };
                let canonical_config = config.shallow_clone_with_new_id();
                let canonical = self.config_cache.add_or_get_existing(canonical_config);
                self.session.as_mut().unwrap().config_remap.insert((node_id, local_id), canonical);
            }
            NodePacket::Result(result) => self.on_result(node_id, result)?,
            NodePacket::Blocker(blocker) => self.on_blocker(node_id, blocker)?,
            NodePacket::Log(msg) => info!("node {node_id} log: {:?}", msg.payload),
            NodePacket::Shutdown { reason } => warn!("node {node_id} reported shutdown: {reason}"),
            NodePacket::Unblocker(_) => {}
            NodePacket::Request(_) => {}
        }
        Ok(())
    }

    fn on_result(&mut self, node_id: i32, result: BuildResult) -> Result<()> {
        let global_request_id = {
            let session = self.require_building()?;
            match session.node_running.remove(&node_id) {
                Some(id) => id,
                None => return Ok(()),
            }
        };
        self.results_cache.add_or_merge(result.clone());
        let waiters = self.session.as_mut().unwrap().scheduler.complete_request(global_request_id);

        for waiter_id in waiters {
            let delivered_to_submission = {
                let session = self.session.as_mut().unwrap();
                if let Some(submission) = session.submissions.get_mut(&waiter_id) {
                    submission.result = Some(result.clone());
                    submission.state = SubmissionState::Completed;
                    true
                } else {
                    false
                }
            };
            if !delivered_to_submission {
                self.resolve_pending_block(waiter_id, result.clone());
            }
        }
        Ok(())
    }

    /// Records `waiter_id`'s result against whichever parent request it was
    /// blocking; once every child of that parent has reported, sends the
    /// parent's node a `BuildRequestUnblocker`.
    fn resolve_pending_block(&mut self, waiter_id: i32, result: BuildResult) {
        let session = self.session.as_mut().unwrap();
        let Some(parent_global_request_id) =
            session.pending_blocks.iter().find(|(_, b)| b.remaining.contains(&waiter_id)).map(|(id, _)| *id)
        else {
            return;
        };
        let block = session.pending_blocks.get_mut(&parent_global_request_id).unwrap();
        block.remaining.remove(&waiter_id);
        block.collected.push(result);
        if block.remaining.is_empty() {
            let block = session.pending_blocks.remove(&parent_global_request_id).unwrap();
            let _ = session.nodes[&block.node_id].send(NodePacket::Unblocker(BuildRequestUnblocker {
                unblocked_global_request_id: parent_global_request_id,
                results: block.collected,
            }));
        }
    }

    /// Handles a node's request for nested builds: canonicalizes each
    /// child's negative configuration id, registers the cycle check, and
    /// schedules (or replays, or collapses) each child.
    ///
    /// Nested (P2P) requests always consult the results cache with
    /// `skip_unsuccessful = true`: a project reference that already failed
    /// once in this session is replayed as a failure rather than re-run, so
    /// a second reference to the same failed project never re-executes its
    /// targets.
    fn on_blocker(&mut self, node_id: i32, blocker: BuildRequestBlocker) -> Result<()> {
        let blocked_global_request_id = blocker.blocked_global_request_id;
        let mut remaining = HashSet::new();
        let mut collected = Vec::new();

        for mut child in blocker.child_requests {
            let canonical = {
                let session = self.session.as_mut().unwrap();
                *session.config_remap.get(&(node_id, child.configuration_id)).unwrap_or(&child.configuration_id)
            };
            child.configuration_id = canonical;
            let targets = child.targets.as_targets().unwrap_or(&[]).to_vec();

            if let Some(cached) =
                self.session.as_ref().unwrap().scheduler.try_cache_fast_path(canonical, &targets, true, &self.results_cache)
            {
                // Already resolved: nothing live to register a block against,
                // so this can never be party to a cycle.
                log_cached_replay(canonical, &cached);
                collected.push(cached);
                continue;
            }

            let (waiter_id, decision) = {
                let session = self.session.as_mut().unwrap();
                let waiter_id = session.next_waiter_id;
                session.next_waiter_id += 1;
                let decision = session.scheduler.submit_root_request(waiter_id, canonical, targets, NodeAffinity::Any);
                (waiter_id, decision)
            };

            // Register the cycle check against the request's real global id,
            // never the worker's locally-invented placeholder, since that's
            // the id `blocked_on`/`reaches` actually track.
            let blocking_global_request_id = match &decision {
                SchedulingDecision::Collapsed { leader_global_request_id } => Some(*leader_global_request_id),
                SchedulingDecision::Scheduled { global_request_id, .. } => Some(*global_request_id),
                SchedulingDecision::Cached(_) => None,
            };
            if let Some(blocking) = blocking_global_request_id {
                let registered = self.session.as_mut().unwrap().scheduler.register_block_on(blocked_global_request_id, blocking);
                if let Err(err) = registered {
                    warn!("rejecting nested build that would cycle: {err}");
                    continue;
                }
            }

            match decision {
                SchedulingDecision::Cached(result) => collected.push(result),
                SchedulingDecision::Collapsed { .. } => {
                    // Delivered later when the leader completes and
                    // `complete_request` returns this waiter id.
                    remaining.insert(waiter_id);
                }
                SchedulingDecision::Scheduled { global_request_id, node_id: target_node, create_node } => {
                    let mut dispatch_request = child;
                    dispatch_request.node_request_id = global_request_id;
                    let session = self.session.as_mut().unwrap();
                    Self::dispatch(session, target_node, create_node, dispatch_request)?;
                    remaining.insert(waiter_id);
                }
            }
        }

        if remaining.is_empty() {
            let session = self.session.as_ref().unwrap();
            let _ = session.nodes[&node_id]
                .send(NodePacket::Unblocker(BuildRequestUnblocker { unblocked_global_request_id: blocked_global_request_id, results: collected }));
        } else {
            self.session.as_mut().unwrap().pending_blocks.insert(blocked_global_request_id, PendingBlock { node_id, remaining, collected });
        }
        Ok(())
    }

    pub fn cancel_all_submissions(&mut self) -> Result<()> {
        let session = self.require_building()?;
        info!("cancel all submissions");
        session.cancelled = true;
        for handle in session.nodes.values() {
            handle.shutdown("build canceled");
        }
        for submission in session.submissions.values_mut() {
            if !submission.is_complete() {
                let mut result = BuildResult::new(0);
                result.set_failed("build canceled");
                submission.result = Some(result);
                submission.state = SubmissionState::Completed;
            }
        }
        Ok(())
    }

    pub fn shutdown_all_nodes(&mut self) -> Result<()> {
        let session = self.require_building()?;
        for handle in session.nodes.values() {
            handle.shutdown("session ending");
        }
        session.nodes.clear();
        Ok(())
    }

    pub fn end_build(&mut self) -> Result<()> {
        self.shutdown_all_nodes()?;
        self.task_host.shutdown_all();
        self.session = None;
        info!("end build");
        Ok(())
    }

    /// Begins a full-isolation results scope: results recorded from here on
    /// are visible to lookups but shadow the shared session cache rather
    /// than writing into it, so an isolated submission's results never leak
    /// out. Call `end_isolated_scope` when the isolated submission finishes.
    pub fn begin_isolated_scope(&mut self) {
        self.results_cache.begin_override_scope();
    }

    /// Ends the isolation scope begun by `begin_isolated_scope`, discarding
    /// its shadow entries without merging them into the shared cache.
    pub fn end_isolated_scope(&mut self) {
        self.results_cache.end_override_scope();
    }

    /// Clears the config and results caches. Only valid while idle, since a
    /// live session holds configuration ids the scheduler depends on.
    pub fn reset_caches(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(BuildManagerError::InvalidOperation {
                kind: InvalidOperationKind::EndBuildWhileIdle,
                state: "Building",
            });
        }
        info!("reset caches");
        self.config_cache.clear();
        self.results_cache.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NoOpExecutor;
    use std::collections::BTreeMap;

    fn manager() -> BuildManager {
        BuildManager::new(BuildParameters::new(2), Arc::new(NoOpExecutor))
    }

    #[test]
    fn begin_build_twice_is_rejected() {
        let mut mgr = manager();
        mgr.begin_build().unwrap();
        let err = mgr.begin_build().unwrap_err();
        assert!(matches!(err, BuildManagerError::InvalidOperation { kind: InvalidOperationKind::BeginBuildWhileBuilding, .. }));
    }

    #[test]
    fn pend_request_while_idle_is_rejected() {
        let mut mgr = manager();
        let data = BuildRequestData::new(PathBuf::from("/p.proj"), BTreeMap::new()).with_targets(vec!["Build".to_string()]);
        let err = mgr.pend_build_request(data).unwrap_err();
        assert!(matches!(err, BuildManagerError::InvalidOperation { kind: InvalidOperationKind::PendRequestWhileIdle, .. }));
    }

    #[test]
    fn simple_build_completes_via_noop_executor() {
        let mut mgr = manager();
        let data = BuildRequestData::new(PathBuf::from("/p.proj"), BTreeMap::new()).with_targets(vec!["Build".to_string()]);
        let result = mgr.build(data).unwrap();
        assert!(result.has_results_for_target("Build"));
        mgr.end_build().unwrap();
    }

    #[test]
    fn identical_submissions_in_one_build_both_see_the_result() {
        let mut mgr = manager();
        mgr.begin_build().unwrap();
        let data = BuildRequestData::new(PathBuf::from("/p.proj"), BTreeMap::new()).with_targets(vec!["Build".to_string()]);
        let first = mgr.pend_build_request(data.clone()).unwrap();
        let second = mgr.pend_build_request(data).unwrap();
        assert!(mgr.build_request(first).unwrap().has_results_for_target("Build"));
        assert!(mgr.build_request(second).unwrap().has_results_for_target("Build"));
        mgr.end_build().unwrap();
    }

    #[test]
    fn isolated_scope_results_do_not_leak_into_the_shared_cache() {
        let mut mgr = manager();
        mgr.begin_build().unwrap();
        mgr.begin_isolated_scope();
        let data = BuildRequestData::new(PathBuf::from("/isolated.proj"), BTreeMap::new()).with_targets(vec!["Build".to_string()]);
        let id = mgr.pend_build_request(data).unwrap();
        mgr.build_request(id).unwrap();
        mgr.end_isolated_scope();
        assert!(!mgr.results_cache.has_results_for_target(1, "Build"));
        mgr.end_build().unwrap();
    }

    #[test]
    fn reset_caches_while_building_is_rejected() {
        let mut mgr = manager();
        mgr.begin_build().unwrap();
        let err = mgr.reset_caches().unwrap_err();
        assert!(matches!(err, BuildManagerError::InvalidOperation { kind: InvalidOperationKind::EndBuildWhileIdle, .. }));
    }
}
