//! Transport abstraction.
//!
//! The engine is transport-agnostic: any reliable, message-framed byte
//! pipe (TCP with MSRP framing, WebSocket, a data channel) can carry a
//! session by implementing [`Transport`] for the outbound direction and
//! feeding [`TransportEvent`]s into the engine for the inbound one.

use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// Outbound half of a connection. Sends are fire-and-forget; delivery
/// failures surface as a later close event.
pub trait Transport: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

/// Inbound events a transport adapter feeds into the engine (directly,
/// or via the driver's event channel).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is up.
    Open,
    /// One complete MSRP frame.
    Frame(Bytes),
    /// The connection is down. The engine keeps its senders and resumes
    /// them if the transport reopens.
    Close,
}
