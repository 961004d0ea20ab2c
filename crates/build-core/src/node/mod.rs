//! The node protocol transport and worker loop, and the two node providers
//! (in-process thread, out-of-process child worker) that spawn them.

mod provider;
mod transport;
mod worker;

pub use provider::{run_out_of_proc_worker_main, InProcNodeProvider, NodeHandle, NodeProvider, OutOfProcNodeProvider};
pub use transport::{InProcTransport, NodeTransport, ProcessTransport};
pub use worker::run_node_worker;
