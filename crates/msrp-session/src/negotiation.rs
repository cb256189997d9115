//! Negotiated peer capabilities.
//!
//! SDP offer/answer (or whatever signalling carries it) happens outside
//! this crate; once it completes, the application hands the engine the
//! peer's side as a [`PeerInfo`] and publishes the engine's
//! [`local_info`](crate::session::SessionEngine::local_info) as its own.

/// The peer's endpoint path and accepted content types.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    /// The peer's endpoint URI path, in forwarding order.
    pub path: Vec<String>,
    /// MIME types the peer accepts. `*` accepts everything.
    pub accept_types: Vec<String>,
    /// Types the peer accepts inside container types.
    pub accept_wrapped_types: Vec<String>,
}
