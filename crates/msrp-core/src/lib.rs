//! MSRP wire model: message types, the framing codec, status codes,
//! identifier generation and endpoint configuration.

pub mod config;
pub mod headers;
pub mod ident;
pub mod message;
pub mod status;
pub mod wire;

pub use message::{Body, ByteRange, Flag, Message, Method, Request, Response};
pub use wire::DecodeError;
