//! Session-layer error taxonomy.
//!
//! Only [`SessionError::Decode`] is fatal to a connection; the caller
//! must drop the transport when it surfaces. Everything else degrades to
//! a single operation or message failing.

use msrp_core::DecodeError;

use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed wire data. Fatal: the connection must be dropped.
    #[error("malformed frame: {0}")]
    Decode(#[from] DecodeError),

    #[error("session is not established")]
    NotEstablished,

    #[error("no in-progress message with id {0}")]
    UnknownMessage(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session task has ended; the handle is no longer usable.
    #[error("session is closed")]
    Closed,
}
