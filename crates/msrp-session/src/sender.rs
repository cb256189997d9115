//! Transmission of one outgoing chunked message.
//!
//! Two cursors again: `sent_bytes` is the highest offset handed to the
//! transport, `acked_bytes` the highest contiguously REPORT-acknowledged
//! offset. REPORTs may arrive out of order; gapped ones wait in a map
//! capped at 16 entries, beyond which the sender resumes from the last
//! acknowledged position instead of buffering without bound.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use msrp_core::message::{Body, ByteRange, Flag, Method, Request};
use msrp_core::{headers, status};

/// Gapped REPORTs buffered before forcing a resume.
const MAX_PENDING_REPORTS: usize = 16;

pub struct ChunkSender {
    message_id: String,
    payload: Bytes,
    /// Emit body slices as text when the payload is textual and the slice
    /// is valid UTF-8.
    text: bool,
    content_type: Option<String>,
    disposition: Option<String>,
    description: Option<String>,
    size: u64,
    sent_bytes: u64,
    acked_bytes: u64,
    /// REPORT ranges that arrived ahead of the acked cursor: start → end.
    pending_reports: BTreeMap<u64, u64>,
    aborted: bool,
    remote_abort: bool,
    /// Armed when the final chunk is emitted; the session fails the send
    /// if the terminal REPORT has not arrived by then.
    report_deadline: Option<Instant>,
    chunk_size: usize,
    report_timeout: Duration,
}

impl ChunkSender {
    /// An empty body produces a single zero-length SEND (RFC 4975
    /// section 5.4), with no Content-Type.
    pub fn new(
        message_id: String,
        body: Option<Body>,
        content_type: Option<String>,
        disposition: Option<String>,
        description: Option<String>,
        chunk_size: usize,
        report_timeout: Duration,
    ) -> Self {
        let text = body.as_ref().is_some_and(Body::is_text);
        let (payload, default_type) = match body {
            None => (Bytes::new(), None),
            Some(Body::Text(text)) => (Bytes::from(text), Some("text/plain")),
            Some(Body::Binary(bytes)) => (bytes, Some("application/octet-stream")),
        };
        let content_type = match default_type {
            None => None,
            Some(default) => Some(
                content_type
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| default.to_string()),
            ),
        };

        let size = payload.len() as u64;
        Self {
            message_id,
            payload,
            text,
            content_type,
            disposition,
            description,
            size,
            sent_bytes: 0,
            acked_bytes: 0,
            pending_reports: BTreeMap::new(),
            aborted: false,
            remote_abort: false,
            report_deadline: None,
            chunk_size,
            report_timeout,
        }
    }

    /// Produce the next chunk and advance `sent_bytes`. After `abort()`
    /// this produces a single abort-flagged request instead.
    pub fn next_chunk(&mut self, tid: String, now: Instant) -> Request {
        let mut chunk = Request::new(tid, Method::Send);
        chunk.message_id = Some(self.message_id.clone());
        chunk.add_header(headers::MESSAGE_ID, &self.message_id);
        chunk.add_header(headers::SUCCESS_REPORT, "yes");
        chunk.add_header(headers::FAILURE_REPORT, "yes");

        if self.aborted {
            chunk.flag = Flag::Abort;
            return chunk;
        }

        let start = self.sent_bytes + 1;
        let end = (self.sent_bytes + self.chunk_size as u64).min(self.size);
        chunk.byte_range = Some(ByteRange::new(start as i64, end as i64, self.size as i64));

        if self.size > 0 {
            if self.sent_bytes == 0 {
                // MIME headers travel on the first chunk only.
                match &self.disposition {
                    Some(disposition) => {
                        chunk.add_header(headers::CONTENT_DISPOSITION, disposition)
                    }
                    None => chunk.add_header(headers::CONTENT_DISPOSITION, "inline"),
                }
                if let Some(description) = &self.description {
                    chunk.add_header(headers::CONTENT_DESCRIPTION, description);
                }
            }

            let slice = self.payload.slice(self.sent_bytes as usize..end as usize);
            let body = match std::str::from_utf8(&slice) {
                Ok(text) if self.text => Body::Text(text.to_string()),
                _ => Body::Binary(slice),
            };
            if let Some(content_type) = &self.content_type {
                chunk.set_body(content_type.clone(), body);
            }
        }

        if end < self.size {
            chunk.flag = Flag::Continued;
        } else {
            chunk.flag = Flag::End;
            self.report_deadline = Some(now + self.report_timeout);
        }
        self.sent_bytes = end;

        chunk
    }

    /// Merge one REPORT into the acknowledgement state. A failure status
    /// aborts the send; a success report extends `acked_bytes` or waits
    /// in the gap buffer.
    pub fn process_report(&mut self, report: &Request) {
        if report.message_id.as_deref() != Some(self.message_id.as_str()) {
            tracing::warn!(
                expected = %self.message_id,
                got = ?report.message_id,
                "REPORT has wrong message id, ignoring"
            );
            return;
        }

        let (report_status, _) = match &report.report_status {
            Some(status) => status.clone(),
            None => {
                tracing::warn!(message_id = %self.message_id, "REPORT carries no Status header, ignoring");
                return;
            }
        };

        if report_status != status::OK {
            self.abort();
            self.remote_abort = true;
        } else {
            let range = report.byte_range.unwrap_or_else(ByteRange::unparsed);
            let start = range.start.max(1) as u64;
            let end = range.end.max(0) as u64;

            if start <= self.acked_bytes + 1 {
                if end > self.acked_bytes {
                    self.acked_bytes = end;
                }
            } else if self.pending_reports.len() >= MAX_PENDING_REPORTS {
                // Too many gaps; retransmit from the acked position
                // instead of buffering without bound.
                self.resume();
                return;
            } else {
                self.pending_reports.insert(start, end);
                return;
            }

            // Drain buffered reports that have become contiguous.
            while let Some((&start, &end)) = self.pending_reports.first_key_value() {
                if start > self.acked_bytes + 1 {
                    break;
                }
                if end > self.acked_bytes {
                    self.acked_bytes = end;
                }
                self.pending_reports.remove(&start);
            }
        }

        if self.is_complete() {
            self.report_deadline = None;
        }
    }

    /// True once every byte has been handed to the transport, or the send
    /// was aborted.
    pub fn is_send_complete(&self) -> bool {
        self.aborted || self.sent_bytes >= self.size
    }

    /// True once every byte has been acknowledged, or the send was
    /// aborted.
    pub fn is_complete(&self) -> bool {
        self.aborted || self.acked_bytes >= self.size
    }

    /// Rewind to the last acknowledged position after a reconnect or a
    /// gap-buffer overflow; the next chunks retransmit from there.
    pub fn resume(&mut self) {
        self.sent_bytes = self.acked_bytes;
        self.pending_reports.clear();
        tracing::debug!(
            message_id = %self.message_id,
            offset = self.sent_bytes,
            "resuming transmission"
        );
    }

    /// Mark the send aborted. Idempotent; the next chunk emitted carries
    /// the abort flag.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn acked_bytes(&self) -> u64 {
        self.acked_bytes
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn remote_abort(&self) -> bool {
        self.remote_abort
    }

    pub fn report_deadline(&self) -> Option<Instant> {
        self.report_deadline
    }
}
