//! A `NodeTransport` carries `NodePacket`s between the scheduler side and a
//! worker node. Two implementations share the same interface: an in-process
//! pair of `crossbeam_channel`s, and newline-delimited JSON over a child
//! process's stdio (mirrors `CargoHandle`'s piped-stdio-plus-reader-thread
//! pattern, generalized to a full duplex protocol instead of one-way
//! output-only streaming).

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::Mutex;

use build_protocol::NodePacket;
use crossbeam_channel::{Receiver, Sender};

use crate::error::NodeProtocolError;

pub trait NodeTransport: Send + Sync {
    fn send(&self, packet: NodePacket) -> Result<(), NodeProtocolError>;
    fn recv(&self) -> Result<NodePacket, NodeProtocolError>;
}

/// Both directions are plain channels; used for in-process nodes and for
/// the scheduler-side end of any transport when no real OS process is
/// involved.
pub struct InProcTransport {
    pub to_peer: Sender<NodePacket>,
    pub from_peer: Receiver<NodePacket>,
}

impl InProcTransport {
    /// Builds a connected pair: `(scheduler_side, worker_side)`.
    pub fn pair() -> (InProcTransport, InProcTransport) {
        let (s2w_tx, s2w_rx) = crossbeam_channel::unbounded();
        let (w2s_tx, w2s_rx) = crossbeam_channel::unbounded();
        (
            InProcTransport { to_peer: s2w_tx, from_peer: w2s_rx },
            InProcTransport { to_peer: w2s_tx, from_peer: s2w_rx },
        )
    }
}

impl NodeTransport for InProcTransport {
    fn send(&self, packet: NodePacket) -> Result<(), NodeProtocolError> {
        self.to_peer.send(packet).map_err(|_| NodeProtocolError::NodeShutdown(0))
    }

    fn recv(&self) -> Result<NodePacket, NodeProtocolError> {
        self.from_peer.recv().map_err(|_| NodeProtocolError::NodeShutdown(0))
    }
}

/// One line of JSON per packet in each direction, over any writer/reader
/// pair — a child process's piped stdio from the scheduler side, or the
/// worker process's own stdio on the child side.
pub struct ProcessTransport<W: Write + Send, R: Read + Send> {
    writer: Mutex<W>,
    lines: Mutex<BufReader<R>>,
}

impl<W: Write + Send, R: Read + Send> ProcessTransport<W, R> {
    pub fn new(writer: W, reader: R) -> Self {
        ProcessTransport { writer: Mutex::new(writer), lines: Mutex::new(BufReader::new(reader)) }
    }
}

impl<W: Write + Send, R: Read + Send> NodeTransport for ProcessTransport<W, R> {
    fn send(&self, packet: NodePacket) -> Result<(), NodeProtocolError> {
        let mut line = serde_json::to_string(&packet).map_err(|e| NodeProtocolError::Malformed(e.to_string()))?;
        line.push('\n');
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn recv(&self) -> Result<NodePacket, NodeProtocolError> {
        let mut buf = String::new();
        let mut lines = self.lines.lock().unwrap();
        let read = lines.read_line(&mut buf)?;
        if read == 0 {
            return Err(NodeProtocolError::NodeShutdown(0));
        }
        serde_json::from_str(buf.trim_end()).map_err(|e| NodeProtocolError::Malformed(e.to_string()))
    }
}
