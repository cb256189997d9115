//! MSRP integration test harness.
//!
//! Two session engines joined back to back by in-memory transports. Each
//! engine writes frames into its outbox; the harness shuttles them to the
//! other engine, either all at once (`deliver`) or one hop at a time for
//! tests that need to interfere mid-flight. Timers run off a shared
//! manual clock, so timeout paths are exercised without sleeping.

mod failures;
mod messaging;
mod recovery;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use msrp_core::config::MsrpConfig;
use msrp_core::ident::SequentialIds;
use msrp_core::Body;
use msrp_session::clock::ManualClock;
use msrp_session::{
    SessionEngine, SessionEvents, TransferDecision, TransferInfo, Transport, TransportError,
};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Transport that parks frames for the harness to shuttle.
#[derive(Clone, Default)]
pub struct Outbox {
    frames: Arc<Mutex<VecDeque<Bytes>>>,
}

impl Outbox {
    pub fn drain(&self) -> Vec<Bytes> {
        self.frames.lock().unwrap().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().unwrap().is_empty()
    }
}

impl Transport for Outbox {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.frames
            .lock()
            .unwrap()
            .push_back(Bytes::copy_from_slice(frame));
        Ok(())
    }
}

/// Event sink that records everything for assertions.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
    messages: Arc<Mutex<Vec<(String, Option<String>, Vec<u8>)>>>,
    transfers: Arc<Mutex<Vec<TransferInfo>>>,
    reject_all: Arc<Mutex<bool>>,
}

impl Recorder {
    pub fn reject_all(&self) {
        *self.reject_all.lock().unwrap() = true;
    }

    pub fn saw(&self, event: &str) -> bool {
        self.log.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// What the engine announced when an incoming transfer started.
    pub fn transfer(&self, message_id: &str) -> Option<TransferInfo> {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .find(|info| info.message_id == message_id)
            .cloned()
    }

    /// Content type and body of a completed incoming message.
    pub fn message(&self, message_id: &str) -> Option<(Option<String>, Vec<u8>)> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .find(|(mid, _, _)| mid == message_id)
            .map(|(_, ct, body)| (ct.clone(), body.clone()))
    }

    fn push(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl SessionEvents for Recorder {
    fn transfer_started(&mut self, info: &TransferInfo) -> TransferDecision {
        self.push(format!("transfer_started {}", info.message_id));
        self.transfers.lock().unwrap().push(info.clone());
        if *self.reject_all.lock().unwrap() {
            TransferDecision::Reject
        } else {
            TransferDecision::Accept
        }
    }

    fn message_received(&mut self, message_id: &str, content_type: Option<&str>, body: Body) {
        self.push(format!("message_received {message_id}"));
        self.messages.lock().unwrap().push((
            message_id.to_string(),
            content_type.map(str::to_string),
            body.as_bytes().to_vec(),
        ));
    }

    fn receive_aborted(&mut self, message_id: &str, _partial: Bytes) {
        self.push(format!("receive_aborted {message_id}"));
    }

    fn receive_timed_out(&mut self, message_id: &str, _partial: Bytes) {
        self.push(format!("receive_timed_out {message_id}"));
    }

    fn message_sent(&mut self, message_id: &str) {
        self.push(format!("message_sent {message_id}"));
    }

    fn message_delivered(&mut self, message_id: &str) {
        self.push(format!("message_delivered {message_id}"));
    }

    fn send_failed(&mut self, message_id: &str, status: u16, _comment: Option<&str>) {
        self.push(format!("send_failed {message_id} {status}"));
    }

    fn session_established(&mut self) {
        self.push("established".to_string());
    }

    fn session_closed(&mut self) {
        self.push("closed".to_string());
    }
}

/// Two engines wired back to back.
pub struct Pair {
    pub a: SessionEngine,
    pub b: SessionEngine,
    pub a_out: Outbox,
    pub b_out: Outbox,
    pub a_events: Recorder,
    pub b_events: Recorder,
    pub clock: ManualClock,
}

/// Payload bytes per chunk in every test, small enough that modest
/// messages span several chunks.
pub const CHUNK: usize = 16;

impl Pair {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl Fn(&mut MsrpConfig)) -> Self {
        let clock = ManualClock::new();
        let a_out = Outbox::default();
        let b_out = Outbox::default();
        let a_events = Recorder::default();
        let b_events = Recorder::default();

        let build = |name: &str, out: &Outbox, events: &Recorder| {
            let mut config = MsrpConfig::default();
            config.transfer.chunk_size = CHUNK;
            configure(&mut config);
            SessionEngine::new(
                config,
                Box::new(out.clone()),
                Box::new(events.clone()),
                Box::new(clock.clone()),
                Box::new(SequentialIds::new(name)),
                None,
            )
        };

        Pair {
            a: build("a", &a_out, &a_events),
            b: build("b", &b_out, &b_events),
            a_out,
            b_out,
            a_events,
            b_events,
            clock,
        }
    }

    /// Bring both transports up and exchange negotiated paths.
    pub fn connect(&mut self) {
        self.a.on_open();
        self.b.on_open();
        let a_info = self.a.local_info();
        let b_info = self.b.local_info();
        self.a.set_peer(b_info);
        self.b.set_peer(a_info);
        assert!(self.a_events.saw("established"));
        assert!(self.b_events.saw("established"));
    }

    /// Shuttle frames both ways until the wire goes quiet.
    pub fn deliver(&mut self) {
        loop {
            let mut moved = false;
            for frame in self.a_out.drain() {
                moved = true;
                self.b.on_frame(&frame).unwrap();
            }
            for frame in self.b_out.drain() {
                moved = true;
                self.a.on_frame(&frame).unwrap();
            }
            if !moved {
                break;
            }
        }
    }

    /// One hop: everything currently queued at A lands at B.
    pub fn deliver_a_to_b(&mut self) {
        for frame in self.a_out.drain() {
            self.b.on_frame(&frame).unwrap();
        }
    }

    /// One hop: everything currently queued at B lands at A.
    pub fn deliver_b_to_a(&mut self) {
        for frame in self.b_out.drain() {
            self.a.on_frame(&frame).unwrap();
        }
    }

    pub fn send_text(&mut self, text: &str) -> String {
        self.a
            .send(Some(Body::Text(text.to_string())), None, None, None)
            .unwrap()
    }
}

#[test]
fn connected_pair_is_quiet_until_someone_sends() {
    let mut pair = Pair::new();
    pair.connect();
    pair.deliver();
    assert!(pair.a_out.is_empty());
    assert!(pair.b_out.is_empty());
    assert_eq!(pair.a_events.events(), ["established"]);
    assert_eq!(pair.b_events.events(), ["established"]);
}
