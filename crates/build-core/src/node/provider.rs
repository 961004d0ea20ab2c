//! Node providers turn a `CreateNode` schedule response into a running
//! worker and a scheduler-side handle to it. Grounded in `CargoHandle`'s
//! spawn-thread-plus-process pattern: a join-on-drop thread (or the thread
//! driving an in-process worker directly) paired with a channel the
//! scheduler polls.

use std::process::{ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;

use build_protocol::{NodePacket, NodeType};
use command_group::{CommandGroup, GroupChild};
use crossbeam_channel::Sender;
use log::info;

use crate::error::NodeProtocolError;
use crate::node::transport::{InProcTransport, NodeTransport, ProcessTransport};
use crate::node::worker::run_node_worker;
use crate::project::{NoOpExecutor, TargetExecutor};

/// Scheduler-side handle to a live node. Dropping it joins the worker
/// thread (in-proc) or waits on the child process (out-of-proc), same as
/// `CargoHandle`'s teardown. A node's inbound packets don't come back
/// through this handle directly — a forwarder thread (spawned alongside it,
/// mirroring `CargoActor`'s reader-thread-to-channel pattern) pushes them
/// onto the session's shared event channel, tagged with `node_id`, so the
/// session loop can `recv` across every node — in-proc or out-of-proc —
/// through one `Receiver`.
pub struct NodeHandle {
    pub node_id: i32,
    pub node_type: NodeType,
    transport: Arc<dyn NodeTransport>,
    _forwarder: jod_thread::JoinHandle<()>,
    _worker_thread: Option<jod_thread::JoinHandle<()>>,
    _child: Option<GroupChild>,
}

impl NodeHandle {
    pub fn send(&self, packet: NodePacket) -> Result<(), NodeProtocolError> {
        self.transport.send(packet)
    }

    pub fn shutdown(&self, reason: impl Into<String>) {
        let _ = self.transport.send(NodePacket::Shutdown { reason: reason.into() });
    }

    fn spawn_forwarder(node_id: i32, transport: Arc<dyn NodeTransport>, events: Sender<(i32, NodePacket)>) -> jod_thread::JoinHandle<()> {
        jod_thread::Builder::new()
            .name(format!("build-node-{node_id}-reader"))
            .spawn(move || loop {
                match transport.recv() {
                    Ok(packet) => {
                        if events.send((node_id, packet)).is_err() {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            })
            .expect("spawning a node's reader thread should not fail")
    }
}

pub trait NodeProvider: Send {
    fn node_type(&self) -> NodeType;
    fn create_node(&mut self, node_id: i32, events: Sender<(i32, NodePacket)>) -> Result<NodeHandle, NodeProtocolError>;
}

/// Runs the worker on a dedicated joinable thread inside this process,
/// connected by a pair of channels (no serialization overhead).
pub struct InProcNodeProvider {
    executor: Arc<dyn TargetExecutor>,
}

impl InProcNodeProvider {
    pub fn new(executor: Arc<dyn TargetExecutor>) -> Self {
        InProcNodeProvider { executor }
    }
}

impl NodeProvider for InProcNodeProvider {
    fn node_type(&self) -> NodeType {
        NodeType::InProc
    }

    fn create_node(&mut self, node_id: i32, events: Sender<(i32, NodePacket)>) -> Result<NodeHandle, NodeProtocolError> {
        let (scheduler_side, worker_side) = InProcTransport::pair();
        let executor = Arc::clone(&self.executor);
        let worker_thread = jod_thread::Builder::new()
            .name(format!("build-node-{node_id}"))
            .spawn(move || run_node_worker(node_id, &worker_side, executor))
            .map_err(NodeProtocolError::Io)?;

        let transport: Arc<dyn NodeTransport> = Arc::new(scheduler_side);
        let forwarder = NodeHandle::spawn_forwarder(node_id, Arc::clone(&transport), events);
        Ok(NodeHandle {
            node_id,
            node_type: NodeType::InProc,
            transport,
            _forwarder: forwarder,
            _worker_thread: Some(worker_thread),
            _child: None,
        })
    }
}

/// Spawns `worker_binary` as a child process and frames `NodePacket`s over
/// its stdin/stdout as newline-delimited JSON. The child always runs the
/// built-in `NoOpExecutor` (see [`crate::project::NoOpExecutor`]) since a
/// real host's task assemblies are dynamically loaded at runtime, which is
/// out of scope here.
pub struct OutOfProcNodeProvider {
    worker_binary: std::path::PathBuf,
}

impl OutOfProcNodeProvider {
    pub fn new(worker_binary: std::path::PathBuf) -> Self {
        OutOfProcNodeProvider { worker_binary }
    }

    /// Convenience constructor pointing at the build-core worker binary
    /// built alongside this crate.
    pub fn current_exe_worker() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(OutOfProcNodeProvider::new(exe))
    }
}

impl NodeProvider for OutOfProcNodeProvider {
    fn node_type(&self) -> NodeType {
        NodeType::OutOfProc
    }

    fn create_node(&mut self, node_id: i32, events: Sender<(i32, NodePacket)>) -> Result<NodeHandle, NodeProtocolError> {
        let mut command = Command::new(&self.worker_binary);
        command.arg("--node-worker").arg(node_id.to_string());
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());
        info!("spawning out-of-process node {node_id}: {:?}", command);
        let mut child = command.group_spawn()?;

        let stdin = child.inner().stdin.take().expect("piped stdin");
        let stdout = child.inner().stdout.take().expect("piped stdout");
        let transport: Arc<dyn NodeTransport> = Arc::new(ProcessTransport::<ChildStdin, ChildStdout>::new(stdin, stdout));
        let forwarder = NodeHandle::spawn_forwarder(node_id, Arc::clone(&transport), events);

        Ok(NodeHandle {
            node_id,
            node_type: NodeType::OutOfProc,
            transport,
            _forwarder: forwarder,
            _worker_thread: None,
            _child: Some(child),
        })
    }
}

/// Entry point the worker binary calls: reads packets from `stdin`, runs
/// the fixed out-of-process executor, writes results to `stdout`.
pub fn run_out_of_proc_worker_main(node_id: i32) -> Result<(), NodeProtocolError> {
    let transport = ProcessTransport::new(std::io::stdout(), std::io::stdin());
    run_node_worker(node_id, &transport, Arc::new(NoOpExecutor));
    Ok(())
}
