//! Messaging core error types.

use thiserror::Error;
use vgrid_core::MsgType;

use crate::wire::WireError;

/// Errors surfaced by the coordinator's messaging core.
#[derive(Debug, Error)]
pub enum MgmtError {
    /// The gateway could not hand a message off for delivery.
    #[error("dispatch of {msg_type} failed: {reason}")]
    DispatchFailed { msg_type: MsgType, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("state store error: {0}")]
    State(#[from] vgrid_state::StateError),
}

pub type MgmtResult<T> = Result<T, MgmtError>;
