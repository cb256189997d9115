//! MSRP session layer: chunk reassembly, chunk transmission, and the
//! per-session protocol engine.
//!
//! The engine itself ([`session::SessionEngine`]) is synchronous and
//! deterministic; [`driver`] wraps it in a tokio task for async use.

pub mod auth;
pub mod clock;
pub mod driver;
pub mod error;
pub mod events;
pub mod negotiation;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use driver::{spawn, SessionHandle};
pub use error::SessionError;
pub use events::{SessionEvents, TransferDecision, TransferInfo};
pub use negotiation::PeerInfo;
pub use receiver::ChunkReceiver;
pub use sender::ChunkSender;
pub use session::{SessionEngine, SessionState};
pub use transport::{Transport, TransportError, TransportEvent};
