//! Identifier generation behind an injectable trait.
//!
//! Transaction, message and session ids are opaque random tokens. Keeping
//! the generator behind a trait lets the protocol engines run with
//! deterministic ids under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
/// Message ids embed an NTP-style timestamp for rough global uniqueness.
const UNIX_TO_NTP_OFFSET: u64 = 2_208_988_800;

/// Source of protocol identifiers.
pub trait IdSource: Send {
    /// Transaction id, unique per request on a connection.
    /// RFC 4975 section 7.1 requires at least 64 bits of randomness.
    fn transaction_id(&self) -> String;

    /// Message id, identifying a (possibly chunked) message.
    fn message_id(&self) -> String;

    /// Session id, used in the local endpoint URI.
    /// RFC 4975 section 14.1 requires 80 bits of randomness.
    fn session_id(&self) -> String;
}

/// Production id source: random alphanumeric tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

fn ntp_now() -> u64 {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    unix_secs + UNIX_TO_NTP_OFFSET
}

impl IdSource for RandomIds {
    fn transaction_id(&self) -> String {
        random_token(8)
    }

    fn message_id(&self) -> String {
        format!("{}.{}", ntp_now(), random_token(8))
    }

    fn session_id(&self) -> String {
        random_token(10)
    }
}

/// Deterministic id source for tests: `<prefix>-t1`, `<prefix>-t2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counter: AtomicU64::new(0),
        }
    }

    fn next(&self, kind: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}{}", self.prefix, kind, n)
    }
}

impl IdSource for SequentialIds {
    fn transaction_id(&self) -> String {
        self.next("t")
    }

    fn message_id(&self) -> String {
        self.next("m")
    }

    fn session_id(&self) -> String {
        self.next("s")
    }
}
