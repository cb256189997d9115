//! Per-session protocol engine.
//!
//! The engine multiplexes any number of in-progress incoming and
//! outgoing messages over one transport, schedules outgoing chunks under
//! the outstanding-request cap, correlates responses and REPORTs, and
//! drives the relay AUTH exchange when one is configured.
//!
//! All state lives in one struct and is mutated only by discrete event
//! calls (`on_open`, `on_frame`, `on_close`, the application API, and
//! `tick`). Nothing here blocks, sleeps, or reads the ambient clock; the
//! driver owns the event loop and the timer.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;
use msrp_core::config::MsrpConfig;
use msrp_core::ident::IdSource;
use msrp_core::message::{Disposition, Flag, Method, Request, Response};
use msrp_core::{headers, status, wire, Body, ByteRange};

use crate::auth::Authenticator;
use crate::clock::Clock;
use crate::error::SessionError;
use crate::events::{SessionEvents, TransferDecision, TransferInfo};
use crate::negotiation::PeerInfo;
use crate::receiver::ChunkReceiver;
use crate::sender::ChunkSender;
use crate::transport::Transport;

/// Chunks emitted per scheduling pass. Low enough to keep the caller
/// responsive, high enough to ramp up the pipeline across responses.
const CHUNKS_PER_PASS: usize = 2;

/// Assumed relay binding lifetime when the AUTH response omits Expires.
const DEFAULT_AUTH_LIFETIME_SECS: u32 = 600;

/// How far ahead of the binding expiry to re-authenticate.
const REAUTH_LEAD_SECS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport to come up.
    AwaitTransport,
    /// Transport is up; waiting for relay authentication and/or the
    /// negotiated peer info.
    AwaitNegotiation,
    Established,
    Closed,
    /// Terminal: unrecoverable protocol failure.
    Error,
    /// Terminal: relay rejected our credentials.
    AuthFailed,
}

/// A request sent and awaiting its response.
struct InFlight {
    method: Method,
    message_id: Option<String>,
    /// End offset of the chunk, for progress reporting.
    range_end: i64,
    final_chunk: bool,
    /// Carried the abort flag; the application asked for this, so a
    /// failure response to it is not news.
    abort_chunk: bool,
    deadline: Instant,
}

pub struct SessionEngine {
    config: MsrpConfig,
    state: SessionState,
    transport: Box<dyn Transport>,
    events: Box<dyn SessionEvents>,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
    authenticator: Option<Box<dyn Authenticator>>,

    session_id: String,
    local_uri: String,
    /// Relay hops from the Use-Path header, empty for direct sessions.
    relay_path: Vec<String>,
    peer: Option<PeerInfo>,
    /// Full To-Path for outgoing requests: relay hops then the peer path.
    to_path: Vec<String>,

    receivers: HashMap<String, ChunkReceiver>,
    senders: HashMap<String, ChunkSender>,
    /// Senders with chunks left to send, scheduled round-robin.
    active: VecDeque<String>,
    /// SEND requests awaiting a response.
    outstanding: usize,
    in_flight: HashMap<String, InFlight>,

    next_sweep: Option<Instant>,
    reauth_at: Option<Instant>,
    /// Expires value to request on AUTH, adjusted by 423 responses.
    auth_expires: Option<u32>,
    /// We already answered a digest challenge on this connection; another
    /// 401 means the credentials are bad.
    challenge_answered: bool,
    was_established: bool,
}

impl SessionEngine {
    pub fn new(
        config: MsrpConfig,
        transport: Box<dyn Transport>,
        events: Box<dyn SessionEvents>,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
        authenticator: Option<Box<dyn Authenticator>>,
    ) -> Self {
        let session_id = ids.session_id();
        let local_uri = format!(
            "msrp://{}:2855/{};tcp",
            config.endpoint.authority, session_id
        );
        let auth_expires = match config.endpoint.auth_expires {
            0 => None,
            expires => Some(expires),
        };
        Self {
            config,
            state: SessionState::AwaitTransport,
            transport,
            events,
            clock,
            ids,
            authenticator,
            session_id,
            local_uri,
            relay_path: Vec::new(),
            peer: None,
            to_path: Vec::new(),
            receivers: HashMap::new(),
            senders: HashMap::new(),
            active: VecDeque::new(),
            outstanding: 0,
            in_flight: HashMap::new(),
            next_sweep: None,
            reauth_at: None,
            auth_expires,
            challenge_answered: false,
            was_established: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn local_uri(&self) -> &str {
        &self.local_uri
    }

    /// The local side of negotiation: our path (relay hops reversed, then
    /// the local URI) and accepted types, for the application to publish.
    pub fn local_info(&self) -> PeerInfo {
        let mut path: Vec<String> = self.relay_path.iter().rev().cloned().collect();
        path.push(self.local_uri.clone());
        PeerInfo {
            path,
            accept_types: self.config.media.accept_types.clone(),
            accept_wrapped_types: self.config.media.accept_wrapped_types.clone(),
        }
    }

    fn uses_relay(&self) -> bool {
        !self.config.endpoint.relay_uri.is_empty()
    }

    // ── Transport events ──────────────────────────────────────────────────────

    pub fn on_open(&mut self) {
        if self.state != SessionState::AwaitTransport {
            return;
        }
        self.state = SessionState::AwaitNegotiation;
        if self.uses_relay() {
            self.relay_path.clear();
            self.challenge_answered = false;
            self.send_auth(None);
        } else {
            self.try_establish();
        }
    }

    pub fn on_close(&mut self) {
        self.in_flight.clear();
        self.outstanding = 0;
        self.reauth_at = None;
        match self.state {
            SessionState::Closed | SessionState::Error | SessionState::AuthFailed => {}
            _ => {
                tracing::info!(session_id = %self.session_id, "transport lost, awaiting reconnect");
                self.state = SessionState::AwaitTransport;
                self.relay_path.clear();
            }
        }
    }

    /// Feed one decoded-frame's worth of bytes into the engine. A decode
    /// error is fatal: the caller must drop the connection.
    pub fn on_frame(&mut self, data: &[u8]) -> Result<(), SessionError> {
        match wire::decode(data)? {
            msrp_core::Message::Request(req) => {
                if req.to_path.len() != 1 || req.to_path[0] != self.local_uri {
                    tracing::warn!(to_path = ?req.to_path, "request addressed to unknown session");
                    self.respond(&req, status::SESSION_DOES_NOT_EXIST);
                    return Ok(());
                }
                match &req.method {
                    Method::Send => self.handle_send(req),
                    Method::Report => self.handle_report(req),
                    method => {
                        tracing::warn!(%method, "unsupported request method");
                        self.respond(&req, status::NOT_IMPLEMENTED);
                    }
                }
            }
            msrp_core::Message::Response(resp) => self.handle_response(resp),
        }
        Ok(())
    }

    // ── Negotiation ───────────────────────────────────────────────────────────

    /// Hand the engine the peer's negotiated path and accepted types.
    pub fn set_peer(&mut self, peer: PeerInfo) {
        self.peer = Some(peer);
        if self.state == SessionState::Established {
            self.refresh_paths();
        } else {
            self.try_establish();
        }
    }

    fn refresh_paths(&mut self) {
        let mut to_path = self.relay_path.clone();
        if let Some(peer) = &self.peer {
            to_path.extend(peer.path.iter().cloned());
        }
        self.to_path = to_path;
    }

    fn try_establish(&mut self) {
        if self.state != SessionState::AwaitNegotiation || self.peer.is_none() {
            return;
        }
        if self.uses_relay() && self.relay_path.is_empty() {
            // Still waiting for the AUTH exchange to yield a Use-Path.
            return;
        }
        self.refresh_paths();
        self.state = SessionState::Established;

        if self.was_established {
            // Reconnect: retransmit everything from the acknowledged
            // positions. Sorted for a deterministic schedule.
            let mut mids: Vec<String> = self.senders.keys().cloned().collect();
            mids.sort();
            for mid in &mids {
                if let Some(sender) = self.senders.get_mut(mid) {
                    sender.resume();
                }
            }
            self.active = mids
                .into_iter()
                .filter(|mid| {
                    self.senders
                        .get(mid)
                        .is_some_and(|sender| !sender.is_send_complete())
                })
                .collect();
        }
        self.was_established = true;

        tracing::info!(session_id = %self.session_id, "session established");
        self.events.session_established();
        self.pump();
    }

    // ── Application API ───────────────────────────────────────────────────────

    /// Queue a message for transmission. `None` body sends the empty
    /// "ping" SEND used to complete session setup. Returns the message id
    /// used in progress and completion notifications.
    pub fn send(
        &mut self,
        body: Option<Body>,
        content_type: Option<String>,
        disposition: Option<String>,
        description: Option<String>,
    ) -> Result<String, SessionError> {
        if self.state != SessionState::Established {
            return Err(SessionError::NotEstablished);
        }
        let message_id = self.ids.message_id();
        let sender = ChunkSender::new(
            message_id.clone(),
            body,
            content_type,
            disposition,
            description,
            self.config.transfer.chunk_size,
            self.config.timers.report_timeout(),
        );
        tracing::info!(message_id = %message_id, size = sender.size(), "queued outgoing message");
        self.senders.insert(message_id.clone(), sender);
        self.active.push_back(message_id.clone());
        self.pump();
        Ok(message_id)
    }

    /// Abort an outgoing message, or all of them when no id is given.
    /// Takes effect on the next chunk emitted.
    pub fn abort_send(&mut self, message_id: Option<&str>) -> Result<(), SessionError> {
        match message_id {
            Some(mid) => {
                self.senders
                    .get_mut(mid)
                    .ok_or_else(|| SessionError::UnknownMessage(mid.to_string()))?
                    .abort();
            }
            None => {
                for sender in self.senders.values_mut() {
                    sender.abort();
                }
            }
        }
        self.pump();
        Ok(())
    }

    /// Abort an incoming message, or all of them when no id is given.
    /// The peer learns of it when its next chunk is answered with 413.
    pub fn abort_receive(&mut self, message_id: Option<&str>) -> Result<(), SessionError> {
        match message_id {
            Some(mid) => {
                self.receivers
                    .get_mut(mid)
                    .ok_or_else(|| SessionError::UnknownMessage(mid.to_string()))?
                    .abort();
            }
            None => {
                for receiver in self.receivers.values_mut() {
                    receiver.abort();
                }
            }
        }
        Ok(())
    }

    /// Close the session. Best-effort abort chunks go out for anything
    /// still sending; further incoming requests are rejected.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        for sender in self.senders.values_mut() {
            sender.abort();
        }
        for receiver in self.receivers.values_mut() {
            receiver.abort();
        }
        self.pump();
        self.senders.clear();
        self.receivers.clear();
        self.active.clear();
        self.in_flight.clear();
        self.outstanding = 0;
        self.state = SessionState::Closed;
        tracing::info!(session_id = %self.session_id, "session closed");
        self.events.session_closed();
    }

    // ── Timers ────────────────────────────────────────────────────────────────

    /// Process due deadlines and return the time until the next one. The
    /// driver calls this after every event and sleeps for the returned
    /// duration.
    pub fn tick(&mut self) -> Option<Duration> {
        let now = self.clock.now();

        // Lost responses become local 408s.
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(tid, _)| tid.clone())
            .collect();
        for tid in expired {
            tracing::warn!(%tid, "no response within the request timeout, synthesizing 408");
            self.handle_response(Response::new(tid, status::REQUEST_TIMEOUT));
        }

        // Liveness sweep over incoming transfers.
        if self.next_sweep.is_some_and(|at| at <= now) {
            let timeout = self.config.timers.chunk_timeout();
            let stalled: Vec<String> = self
                .receivers
                .iter()
                .filter(|(_, r)| now.duration_since(r.last_activity()) > timeout)
                .map(|(mid, _)| mid.clone())
                .collect();
            for mid in stalled {
                if let Some(mut receiver) = self.receivers.remove(&mid) {
                    receiver.abort();
                    tracing::warn!(message_id = %mid, "incoming transfer stalled, timing out");
                    self.events.receive_timed_out(&mid, receiver.take_body());
                }
            }
            // The sweep self-cancels once no receivers remain.
            self.next_sweep = if self.receivers.is_empty() {
                None
            } else {
                Some(now + self.config.timers.sweep_interval())
            };
        }

        // Fully-sent messages whose terminal REPORT never arrived.
        let overdue: Vec<String> = self
            .senders
            .iter()
            .filter(|(_, s)| s.report_deadline().is_some_and(|at| at <= now))
            .map(|(mid, _)| mid.clone())
            .collect();
        for mid in overdue {
            self.senders.remove(&mid);
            self.active.retain(|m| m != &mid);
            tracing::warn!(message_id = %mid, "terminal REPORT never arrived");
            self.events
                .send_failed(&mid, status::REQUEST_TIMEOUT, Some("Report Timeout"));
        }

        // Refresh the relay binding ahead of its expiry.
        if self.reauth_at.is_some_and(|at| at <= now) {
            self.reauth_at = None;
            self.challenge_answered = false;
            self.send_auth(None);
        }

        self.next_deadline(now)
    }

    fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let mut next: Option<Instant> = None;
        let mut fold = |candidate: Option<Instant>| {
            if let Some(at) = candidate {
                next = Some(match next {
                    Some(n) => n.min(at),
                    None => at,
                });
            }
        };
        for entry in self.in_flight.values() {
            fold(Some(entry.deadline));
        }
        for sender in self.senders.values() {
            fold(sender.report_deadline());
        }
        fold(self.next_sweep);
        fold(self.reauth_at);
        next.map(|at| at.saturating_duration_since(now))
    }

    // ── Incoming requests ─────────────────────────────────────────────────────

    fn handle_send(&mut self, req: Request) {
        if self.state != SessionState::Established {
            self.respond(&req, status::SESSION_DOES_NOT_EXIST);
            return;
        }
        let now = self.clock.now();
        let start = req.byte_range.map(|r| r.start).unwrap_or(1);

        if start == 1 && req.flag == Flag::End {
            self.handle_unchunked_send(req);
            return;
        }

        // A chunk of a multi-chunk message.
        let Some(mid) = req.message_id.clone() else {
            self.respond(&req, status::BAD_REQUEST);
            return;
        };

        if start == 1 && req.flag == Flag::Continued && !self.receivers.contains_key(&mid) {
            if !self.content_type_accepted(&req) {
                self.respond(&req, status::UNSUPPORTED_MEDIA);
                return;
            }
            let receiver =
                ChunkReceiver::new(&req, self.config.transfer.recv_buffer_bytes, now);
            let info = transfer_info(&req, &mid);
            if self.events.transfer_started(&info) == TransferDecision::Reject {
                self.respond(&req, status::UNSUPPORTED_MEDIA);
                return;
            }
            tracing::debug!(message_id = %mid, total = receiver.total(), "incoming transfer started");
            self.receivers.insert(mid.clone(), receiver);
            if self.next_sweep.is_none() {
                self.next_sweep = Some(now + self.config.timers.sweep_interval());
            }
        } else {
            let accepted = match self.receivers.get_mut(&mid) {
                // The first byte never arrived; tell the peer to stop.
                None => {
                    self.respond(&req, status::STOP_SENDING);
                    return;
                }
                Some(receiver) => receiver.process_chunk(&req, now),
            };
            if !accepted {
                if let Some(mut receiver) = self.receivers.remove(&mid) {
                    self.respond(&req, status::STOP_SENDING);
                    self.events.receive_aborted(&mid, receiver.take_body());
                }
                return;
            }
        }

        let complete = self
            .receivers
            .get(&mid)
            .is_some_and(ChunkReceiver::is_complete);
        if complete {
            if let Some(mut receiver) = self.receivers.remove(&mid) {
                let content_type = receiver.content_type().map(str::to_string);
                let body = body_from(content_type.as_deref(), receiver.take_body());
                tracing::info!(message_id = %mid, bytes = body.len(), "incoming message complete");
                self.events
                    .message_received(&mid, content_type.as_deref(), body);
            }
        } else if let Some(receiver) = self.receivers.get(&mid) {
            self.events.chunk_received(&mid, receiver.received_bytes());
        }

        self.respond(&req, status::OK);
        if req.header(headers::SUCCESS_REPORT) == Some("yes") {
            self.send_report(&req);
        }
    }

    /// A complete message in one request (byte 1, end flag).
    fn handle_unchunked_send(&mut self, req: Request) {
        let Some(body) = req.body.clone().filter(|b| !b.is_empty()) else {
            // Empty "ping" SEND (RFC 4975 section 5.4), with or without a
            // Content-Type: acknowledge, nothing to surface to the
            // application.
            self.respond(&req, status::OK);
            if req.header(headers::SUCCESS_REPORT) == Some("yes") {
                self.send_report(&req);
            }
            return;
        };

        // A Message-ID is not required here; generate one so the
        // application still gets a usable handle.
        let mid = match &req.message_id {
            Some(mid) => mid.clone(),
            None => self.ids.message_id(),
        };

        let info = transfer_info(&req, &mid);
        if !self.content_type_accepted(&req)
            || self.events.transfer_started(&info) == TransferDecision::Reject
        {
            self.respond(&req, status::UNSUPPORTED_MEDIA);
            return;
        }

        self.events.chunk_received(&mid, body.len() as u64);
        self.events
            .message_received(&mid, req.content_type.as_deref(), body);
        self.respond(&req, status::OK);
        if req.header(headers::SUCCESS_REPORT) == Some("yes") {
            self.send_report(&req);
        }
    }

    /// Configured media filter; the event sink gets a further say for
    /// anything that passes.
    fn content_type_accepted(&self, req: &Request) -> bool {
        match req.content_type.as_deref() {
            Some(content_type) => {
                let ok = self.config.media.accepts(content_type);
                if !ok {
                    tracing::debug!(content_type, "content type not in the accepted set");
                }
                ok
            }
            None => true,
        }
    }

    fn handle_report(&mut self, report: Request) {
        let Some(mid) = report.message_id.clone() else {
            tracing::warn!("REPORT without a message id, ignoring");
            return;
        };
        let complete = match self.senders.get_mut(&mid) {
            None => {
                // Ignored rather than answered (RFC 4975 section 7.1.2).
                tracing::debug!(message_id = %mid, "REPORT for unknown message, ignoring");
                return;
            }
            Some(sender) => {
                sender.process_report(&report);
                sender.is_complete()
            }
        };
        if !complete {
            return;
        }

        let Some(sender) = self.senders.remove(&mid) else {
            return;
        };
        self.active.retain(|m| m != &mid);

        if sender.aborted() && !sender.remote_abort() {
            // Locally aborted; the application already knows.
            return;
        }

        match &report.report_status {
            Some((code, _)) if *code == status::OK => {
                tracing::info!(message_id = %mid, "message delivered");
                self.events.message_delivered(&mid);
            }
            Some((code, comment)) => {
                self.events.send_failed(&mid, *code, comment.as_deref());
            }
            None => {}
        }
    }

    // ── Responses ─────────────────────────────────────────────────────────────

    fn handle_response(&mut self, resp: Response) {
        let Some(entry) = self.in_flight.remove(&resp.tid) else {
            tracing::debug!(tid = %resp.tid, "response with no matching transaction, ignoring");
            return;
        };
        match entry.method {
            Method::Auth => self.handle_auth_response(resp),
            Method::Send => {
                self.outstanding = self.outstanding.saturating_sub(1);
                let Some(mid) = entry.message_id else {
                    return;
                };
                if resp.is_ok() {
                    let live = self
                        .senders
                        .get(&mid)
                        .is_some_and(|sender| !sender.aborted());
                    if live {
                        self.events.chunk_sent(&mid, entry.range_end);
                    }
                    if entry.final_chunk {
                        self.events.message_sent(&mid);
                    }
                } else {
                    // The next hop refused the chunk; the whole message
                    // fails and no more REPORTs are expected.
                    if let Some(mut sender) = self.senders.remove(&mid) {
                        sender.abort();
                    }
                    self.active.retain(|m| m != &mid);
                    if !entry.abort_chunk {
                        self.events
                            .send_failed(&mid, resp.status, resp.comment.as_deref());
                    }
                }
                self.pump();
            }
            _ => {}
        }
    }

    // ── Relay authentication ──────────────────────────────────────────────────

    fn send_auth(&mut self, challenge: Option<&Response>) {
        let relay_uri = self.config.endpoint.relay_uri.clone();
        let mut req = Request::new(self.ids.transaction_id(), Method::Auth);
        req.to_path = vec![relay_uri.clone()];
        req.from_path = vec![self.local_uri.clone()];

        if let Some(resp) = challenge {
            let Some(authenticator) = self.authenticator.as_mut() else {
                tracing::warn!("relay challenged but no authenticator is configured");
                self.fail_auth();
                return;
            };
            let value = resp
                .authenticate
                .iter()
                .find_map(|ch| authenticator.authorize(ch, "AUTH", &relay_uri));
            match value {
                Some(value) => {
                    req.add_header(headers::AUTHORIZATION, &value);
                    self.challenge_answered = true;
                }
                None => {
                    tracing::warn!("no usable credentials for the digest challenge");
                    self.fail_auth();
                    return;
                }
            }
        }

        if let Some(expires) = self.auth_expires {
            req.add_header(headers::EXPIRES, &expires.to_string());
        }

        let now = self.clock.now();
        let frame = wire::encode_request(&mut req, self.ids.as_ref());
        if let Err(e) = self.transport.send(&frame) {
            tracing::warn!(error = %e, "transport send failed, treating connection as lost");
            self.on_close();
            return;
        }
        self.in_flight.insert(
            req.tid.clone(),
            InFlight {
                method: Method::Auth,
                message_id: None,
                range_end: -1,
                final_chunk: false,
                abort_chunk: false,
                deadline: now + self.config.timers.request_timeout(),
            },
        );
    }

    fn handle_auth_response(&mut self, resp: Response) {
        match resp.status {
            status::UNAUTHORIZED => {
                if self.challenge_answered {
                    tracing::warn!("relay re-challenged after our response, credentials rejected");
                    self.fail_auth();
                } else {
                    self.send_auth(Some(&resp));
                }
            }
            status::OK => {
                if resp.use_path.is_empty() {
                    tracing::warn!("AUTH succeeded without a Use-Path header");
                    self.state = SessionState::Error;
                    return;
                }
                self.relay_path = resp.use_path.clone();
                self.challenge_answered = false;
                let expires = resp.expires.unwrap_or(DEFAULT_AUTH_LIFETIME_SECS);
                let lead = expires.saturating_sub(REAUTH_LEAD_SECS).max(1);
                self.reauth_at = Some(self.clock.now() + Duration::from_secs(u64::from(lead)));
                tracing::info!(expires, hops = self.relay_path.len(), "relay authentication complete");
                self.events.authenticated();
                if self.state == SessionState::Established {
                    // Re-authentication; just adopt the fresh path.
                    self.refresh_paths();
                } else {
                    self.try_establish();
                }
            }
            status::INTERVAL_OUT_OF_BOUNDS => {
                // Our Expires was out of the relay's bounds; retry with
                // the bound it told us about.
                self.auth_expires = resp.expires;
                self.challenge_answered = false;
                self.send_auth(None);
            }
            other => {
                tracing::warn!(status = other, "relay authentication failed");
                self.fail_auth();
            }
        }
    }

    fn fail_auth(&mut self) {
        self.state = SessionState::AuthFailed;
        self.events.auth_failed();
    }

    // ── Outgoing traffic ──────────────────────────────────────────────────────

    /// Scheduling pass: emit up to [`CHUNKS_PER_PASS`] chunks from the
    /// head of the active queue, under the outstanding cap, rotating a
    /// still-busy sender to the tail when others are waiting.
    fn pump(&mut self) {
        if self.state != SessionState::Established {
            return;
        }
        let mut emitted = 0;
        while emitted < CHUNKS_PER_PASS
            && self.outstanding < self.config.transfer.max_outstanding_sends
        {
            let Some(mid) = self.active.front().cloned() else {
                break;
            };
            let now = self.clock.now();
            let tid = self.ids.transaction_id();

            let (mut req, abort_chunk, send_complete) = {
                let Some(sender) = self.senders.get_mut(&mid) else {
                    self.active.pop_front();
                    continue;
                };
                if sender.aborted() && sender.remote_abort() {
                    // The remote already killed this transfer; nothing
                    // more to say on the wire.
                    self.active.pop_front();
                    self.senders.remove(&mid);
                    continue;
                }
                let abort_chunk = sender.aborted();
                let req = sender.next_chunk(tid, now);
                (req, abort_chunk, sender.is_send_complete())
            };
            req.to_path = self.to_path.clone();
            req.from_path = vec![self.local_uri.clone()];
            let final_chunk = req.flag == Flag::End;
            let range_end = req.byte_range.map(|r| r.end).unwrap_or(-1);

            let frame = wire::encode_request(&mut req, self.ids.as_ref());
            if let Err(e) = self.transport.send(&frame) {
                tracing::warn!(error = %e, "transport send failed, treating connection as lost");
                self.on_close();
                return;
            }
            self.outstanding += 1;
            emitted += 1;
            tracing::trace!(message_id = %mid, tid = %req.tid, range_end, "chunk sent");
            self.in_flight.insert(
                req.tid.clone(),
                InFlight {
                    method: Method::Send,
                    message_id: Some(mid.clone()),
                    range_end,
                    final_chunk,
                    abort_chunk,
                    deadline: now + self.config.timers.request_timeout(),
                },
            );

            if abort_chunk {
                // The abort chunk is the sender's last word.
                self.active.pop_front();
                self.senders.remove(&mid);
            } else if send_complete {
                // Stays in the sender map until its REPORTs complete.
                self.active.pop_front();
            } else if self.active.len() > 1 {
                // Round-robin fairness across concurrent messages.
                if let Some(front) = self.active.pop_front() {
                    self.active.push_back(front);
                }
            }
        }
    }

    fn respond(&mut self, req: &Request, code: u16) {
        let allowed = if code == status::OK {
            req.response_policy.on_success
        } else {
            req.response_policy.on_failure
        };
        if !allowed {
            return;
        }
        let resp = Response::reply_to(req, &self.local_uri, code);
        let frame = wire::encode_response(&resp);
        if let Err(e) = self.transport.send(&frame) {
            tracing::warn!(error = %e, "transport send failed, treating connection as lost");
            self.on_close();
        }
    }

    /// Acknowledge a received chunk with a success REPORT. The range end
    /// comes from the actual body length, never the declared range.
    fn send_report(&mut self, req: &Request) {
        let mut report = Request::new(self.ids.transaction_id(), Method::Report);
        report.to_path = req.from_path.clone();
        report.from_path = vec![self.local_uri.clone()];
        if let Some(mid) = &req.message_id {
            report.add_header(headers::MESSAGE_ID, mid);
        }
        report.add_header(headers::STATUS, "000 200 OK");

        if req.byte_range.is_some() || req.flag == Flag::Continued {
            let (start, total) = req
                .byte_range
                .map(|r| (r.start, r.total))
                .unwrap_or((1, ByteRange::UNKNOWN));
            let len = req.body_len() as i64;
            let end = if len == 0 { 0 } else { start + len - 1 };
            if req.byte_range.is_some_and(|r| r.end != end) {
                tracing::warn!(
                    declared = %req.byte_range.unwrap_or_else(ByteRange::unparsed),
                    actual = end,
                    "Byte-Range end does not match the body length"
                );
            }
            report.byte_range = Some(ByteRange::new(start, end, total));
        }

        let frame = wire::encode_request(&mut report, self.ids.as_ref());
        if let Err(e) = self.transport.send(&frame) {
            tracing::warn!(error = %e, "transport send failed, treating connection as lost");
            self.on_close();
        }
    }
}

fn transfer_info(req: &Request, message_id: &str) -> TransferInfo {
    TransferInfo {
        message_id: message_id.to_string(),
        content_type: req.content_type.clone(),
        total: req.byte_range.map(|r| r.total).unwrap_or(ByteRange::UNKNOWN),
        filename: req
            .disposition
            .as_ref()
            .and_then(|d| d.filename().map(str::to_string)),
        description: req
            .header(headers::CONTENT_DESCRIPTION)
            .map(str::to_string),
        is_file: req.disposition.as_ref().is_some_and(Disposition::is_file),
    }
}

fn body_from(content_type: Option<&str>, bytes: Bytes) -> Body {
    let textual =
        content_type.is_some_and(|t| t.starts_with("text/") || t.starts_with("message/"));
    if textual {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            return Body::Text(text.to_string());
        }
    }
    Body::Binary(bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
