//! Dispatch gateway.
//!
//! Every outbound command and response leaves the coordinator through a
//! [`DispatchGateway`]. The gateway delegates to one of two strategies,
//! chosen once at construction:
//!
//! - [`DirectDispatch`] calls the transport synchronously on the caller's
//!   thread. Used when coordinator and worker share a process.
//! - [`QueuedDispatch`] pushes the envelope onto a bounded channel drained by
//!   a single consumer task, so handlers never re-enter the transport from
//!   inside their own call stack. Submission order is preserved.
//!
//! Neither strategy waits for the worker. A message that cannot be handed
//! off is reported as [`MgmtError::DispatchFailed`].

use std::net::Ipv4Addr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use vgrid_core::{DispatchMode, Handle, MsgType, ResultCode};

use crate::envelope::Envelope;
use crate::error::{MgmtError, MgmtResult};

/// The byte-moving layer underneath the gateway.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, envelope: Envelope) -> MgmtResult<()>;
}

impl<F> Transport for F
where
    F: Fn(Envelope) -> MgmtResult<()> + Send + Sync + 'static,
{
    fn deliver(&self, envelope: Envelope) -> MgmtResult<()> {
        self(envelope)
    }
}

/// How an envelope gets from the gateway to the transport.
pub trait DispatchStrategy: Send + Sync {
    fn dispatch(&self, envelope: Envelope) -> MgmtResult<()>;

    fn mode(&self) -> DispatchMode;
}

// ── Direct ────────────────────────────────────────────────────────

pub struct DirectDispatch {
    transport: Arc<dyn Transport>,
}

impl DirectDispatch {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl DispatchStrategy for DirectDispatch {
    fn dispatch(&self, envelope: Envelope) -> MgmtResult<()> {
        let msg_type = envelope.msg_type;
        self.transport
            .deliver(envelope)
            .map_err(|e| MgmtError::DispatchFailed {
                msg_type,
                reason: e.to_string(),
            })
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::Direct
    }
}

// ── Queued ────────────────────────────────────────────────────────

pub struct QueuedDispatch {
    tx: mpsc::Sender<Envelope>,
}

impl QueuedDispatch {
    /// Create the queue without a consumer. The caller owns the receiver.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create the queue and spawn its consumer on the current runtime.
    ///
    /// The consumer exits once every gateway holding this queue is dropped.
    pub fn spawn(transport: Arc<dyn Transport>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::with_channel(capacity);
        let handle = tokio::spawn(run_consumer(rx, transport));
        (queue, handle)
    }
}

impl DispatchStrategy for QueuedDispatch {
    fn dispatch(&self, envelope: Envelope) -> MgmtResult<()> {
        let msg_type = envelope.msg_type;
        self.tx.try_send(envelope).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            MgmtError::DispatchFailed {
                msg_type,
                reason: reason.to_string(),
            }
        })
    }

    fn mode(&self) -> DispatchMode {
        DispatchMode::Queued
    }
}

/// Drain the queue into the transport, one envelope at a time.
pub async fn run_consumer(mut rx: mpsc::Receiver<Envelope>, transport: Arc<dyn Transport>) {
    debug!("dispatch queue consumer started");
    while let Some(envelope) = rx.recv().await {
        let msg_type = envelope.msg_type;
        if let Err(e) = transport.deliver(envelope) {
            error!(msg = %msg_type, error = %e, "queued delivery failed");
        }
    }
    debug!("dispatch queue consumer stopped");
}

// ── Gateway ───────────────────────────────────────────────────────

/// Sends commands to workers and responses to connections.
#[derive(Clone)]
pub struct DispatchGateway {
    strategy: Arc<dyn DispatchStrategy>,
}

impl DispatchGateway {
    pub fn new(strategy: Arc<dyn DispatchStrategy>) -> Self {
        Self { strategy }
    }

    pub fn direct(transport: Arc<dyn Transport>) -> Self {
        Self::new(Arc::new(DirectDispatch::new(transport)))
    }

    /// Queued gateway with its consumer spawned on the current runtime.
    pub fn queued(transport: Arc<dyn Transport>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, handle) = QueuedDispatch::spawn(transport, capacity);
        (Self::new(Arc::new(queue)), handle)
    }

    pub fn mode(&self) -> DispatchMode {
        self.strategy.mode()
    }

    pub fn send_command(
        &self,
        dnode: Ipv4Addr,
        msg_type: MsgType,
        payload: Bytes,
        handle: Option<Handle>,
    ) -> MgmtResult<()> {
        trace!(msg = %msg_type, %dnode, len = payload.len(), "sending command");
        self.strategy
            .dispatch(Envelope::command(dnode, msg_type, payload, handle))
    }

    pub fn send_response(
        &self,
        conn: Handle,
        msg_type: MsgType,
        code: ResultCode,
        payload: Bytes,
    ) -> MgmtResult<()> {
        trace!(msg = %msg_type, %conn, %code, "sending response");
        self.strategy
            .dispatch(Envelope::response(conn, msg_type, code, payload))
    }
}

// ── In-process transport ──────────────────────────────────────────

/// Transport that hands envelopes to an in-process receiver.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, envelope: Envelope) -> MgmtResult<()> {
        self.tx
            .send(envelope)
            .map_err(|_| MgmtError::Transport("local endpoint closed".to_string()))
    }
}
