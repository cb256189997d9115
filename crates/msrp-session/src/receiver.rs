//! Reassembly of one incoming chunked message.
//!
//! Chunks may arrive out of order, duplicated, or overlapping. Two
//! cursors track progress: `size` counts contiguous bytes written to the
//! accumulated store, `received_bytes` counts every byte seen (duplicates
//! included, so it can exceed the total). Out-of-order chunks wait in a
//! map keyed by start offset; in-order data sits in a staging buffer that
//! is flushed into the store when it reaches the configured threshold or
//! the message completes.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use msrp_core::message::{Flag, Request};

pub struct ChunkReceiver {
    message_id: String,
    content_type: Option<String>,
    /// Declared total size, -1 until known. The end-flagged chunk fixes it.
    total: i64,
    /// Contiguous bytes received so far.
    accumulated: BytesMut,
    staging: Vec<Bytes>,
    staged_bytes: usize,
    buffer_size: usize,
    /// Every byte seen, duplicates included.
    received_bytes: u64,
    aborted: bool,
    remote_abort: bool,
    /// Chunks that arrived ahead of the contiguous cursor, keyed by start
    /// offset (1-based).
    pending: BTreeMap<u64, Bytes>,
    last_activity: Instant,
}

impl ChunkReceiver {
    /// Build a receiver from the first chunk of a message. The first
    /// chunk must carry byte offset 1; later chunks may arrive in any
    /// order.
    pub fn new(first_chunk: &Request, buffer_size: usize, now: Instant) -> Self {
        let mut receiver = Self {
            message_id: first_chunk.message_id.clone().unwrap_or_default(),
            content_type: first_chunk.content_type.clone(),
            total: first_chunk
                .byte_range
                .map(|r| r.total)
                .unwrap_or(msrp_core::ByteRange::UNKNOWN),
            accumulated: BytesMut::new(),
            staging: Vec::new(),
            staged_bytes: 0,
            buffer_size,
            received_bytes: 0,
            aborted: false,
            remote_abort: false,
            pending: BTreeMap::new(),
            last_activity: now,
        };
        receiver.process_chunk(first_chunk, now);
        receiver
    }

    /// Fold one chunk into the reassembly state. Returns `false` when the
    /// transfer must be treated as aborted (locally aborted earlier, wrong
    /// message id, or an abort-flagged chunk).
    pub fn process_chunk(&mut self, chunk: &Request, now: Instant) -> bool {
        if self.aborted {
            return false;
        }

        if chunk.message_id.as_deref() != Some(self.message_id.as_str()) {
            tracing::warn!(
                expected = %self.message_id,
                got = ?chunk.message_id,
                "chunk has wrong message id, rejecting"
            );
            return false;
        }

        self.last_activity = now;

        let body = match &chunk.body {
            Some(body) => Bytes::copy_from_slice(body.as_bytes()),
            None => Bytes::new(),
        };
        let len = body.len();
        self.received_bytes += len as u64;

        let start = chunk.byte_range.map(|r| r.start).unwrap_or(1).max(1) as u64;

        match chunk.flag {
            Flag::Continued => {}
            Flag::End => {
                // The terminal chunk pins down an initially unknown total.
                self.total = start as i64 + len as i64 - 1;
            }
            Flag::Abort => {
                self.aborted = true;
                self.remote_abort = true;
                return false;
            }
        }

        let mut next_start = self.size() + self.staged_bytes as u64 + 1;
        if start == next_start {
            next_start += len as u64;
            self.staged_bytes += len;
            self.staging.push(body);

            // Drain any buffered chunks that have become contiguous.
            while let Some(chunk) = self.pending.remove(&next_start) {
                next_start += chunk.len() as u64;
                self.staged_bytes += chunk.len();
                self.staging.push(chunk);
            }

            let filled = self.size() + self.staged_bytes as u64;
            if self.staged_bytes >= self.buffer_size || filled as i64 == self.total {
                self.flush();
            }
        } else if start > next_start {
            // Ahead of the cursor; park it. A collision at the same start
            // offset is a duplicate, and the later arrival wins.
            self.pending.insert(start, body);
        } else {
            // Overlaps already-written data. RFC 4975 section 7.3.1 says
            // the last chunk received takes precedence, so rebuild the
            // store around the new bytes. Best-effort for pathological
            // repeated overlaps.
            self.flush();
            let at = (start - 1) as usize;
            let mut rebuilt = BytesMut::with_capacity(self.accumulated.len().max(at + len));
            rebuilt.extend_from_slice(&self.accumulated[..at.min(self.accumulated.len())]);
            rebuilt.extend_from_slice(&body);
            let after = at + len;
            if after < self.accumulated.len() {
                rebuilt.extend_from_slice(&self.accumulated[after..]);
            }
            self.accumulated = rebuilt;
        }

        true
    }

    fn flush(&mut self) {
        for chunk in self.staging.drain(..) {
            self.accumulated.extend_from_slice(&chunk);
        }
        self.staged_bytes = 0;
    }

    /// True once all bytes are contiguous, or the transfer was aborted.
    pub fn is_complete(&self) -> bool {
        self.aborted || self.size() as i64 == self.total
    }

    /// Mark the transfer aborted. Idempotent; the caller answers the next
    /// incoming chunk with an error response.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// The contiguous bytes received so far, flushing any staged data.
    /// After completion this is the whole message body.
    pub fn take_body(&mut self) -> Bytes {
        self.flush();
        self.accumulated.split().freeze()
    }

    /// Contiguous byte count written to the accumulated store.
    pub fn size(&self) -> u64 {
        self.accumulated.len() as u64
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn remote_abort(&self) -> bool {
        self.remote_abort
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}
