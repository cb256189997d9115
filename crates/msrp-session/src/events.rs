//! Application-facing event sink.
//!
//! The engine reports everything the application can observe through one
//! trait, one method per event. All methods default to no-ops except
//! [`SessionEvents::transfer_started`], which decides whether an incoming
//! transfer is acceptable: a rejection is answered on the wire with
//! status 415.

use bytes::Bytes;
use msrp_core::Body;

/// What the engine knows about an incoming transfer when its first chunk
/// arrives.
#[derive(Debug, Clone)]
pub struct TransferInfo {
    pub message_id: String,
    pub content_type: Option<String>,
    /// Declared total size in bytes, -1 if unknown.
    pub total: i64,
    /// Filename from Content-Disposition, for file transfers.
    pub filename: Option<String>,
    /// Content-Description header, if present.
    pub description: Option<String>,
    /// True when the disposition is `attachment` or `render`.
    pub is_file: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDecision {
    Accept,
    /// Answered with 415 Unsupported Media Type.
    Reject,
}

#[allow(unused_variables)]
pub trait SessionEvents: Send {
    /// First chunk of an incoming message arrived.
    fn transfer_started(&mut self, info: &TransferInfo) -> TransferDecision {
        TransferDecision::Accept
    }

    /// Progress on an incoming message. `received` counts every byte seen,
    /// duplicates included, so it may exceed the declared total.
    fn chunk_received(&mut self, message_id: &str, received: u64) {}

    /// An incoming message is fully reassembled.
    fn message_received(&mut self, message_id: &str, content_type: Option<&str>, body: Body) {}

    /// An incoming message was aborted; `partial` holds the contiguous
    /// bytes received so far.
    fn receive_aborted(&mut self, message_id: &str, partial: Bytes) {}

    /// An incoming message stalled past the chunk timeout.
    fn receive_timed_out(&mut self, message_id: &str, partial: Bytes) {}

    /// A chunk of an outgoing message was accepted by the next hop.
    /// `end` is the highest byte offset covered.
    fn chunk_sent(&mut self, message_id: &str, end: i64) {}

    /// Every chunk of an outgoing message has been sent and accepted by
    /// the next hop. Delivery confirmation comes separately via REPORTs.
    fn message_sent(&mut self, message_id: &str) {}

    /// The peer confirmed receipt of the complete message.
    fn message_delivered(&mut self, message_id: &str) {}

    /// An outgoing message failed: error response, failure REPORT, or
    /// report timeout.
    fn send_failed(&mut self, message_id: &str, status: u16, comment: Option<&str>) {}

    /// Relay authentication succeeded; negotiation may proceed.
    fn authenticated(&mut self) {}

    /// Relay authentication failed permanently.
    fn auth_failed(&mut self) {}

    /// Transport is up and negotiation is complete.
    fn session_established(&mut self) {}

    fn session_closed(&mut self) {}
}
