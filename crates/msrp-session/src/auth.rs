//! Relay authentication collaborator.
//!
//! Building the digest response (RFC 2617 parameter assembly and MD5
//! arithmetic) is plain text munging and lives outside this crate. The
//! engine only needs the finished Authorization header value.

use msrp_core::message::DigestChallenge;

pub trait Authenticator: Send {
    /// Answer a digest challenge for the given method and request URI.
    /// `None` means no usable credentials for this challenge; the engine
    /// treats that as an authentication failure.
    fn authorize(
        &mut self,
        challenge: &DigestChallenge,
        method: &str,
        uri: &str,
    ) -> Option<String>;
}
