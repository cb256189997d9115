//! Aborts, rejections and timeouts.

use std::time::Duration;

use msrp_core::message::Method;
use msrp_core::{wire, Message};

use crate::Pair;

#[test]
fn local_abort_tells_the_peer() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"x".repeat(100));
    // Two chunks are on the wire; abort before the rest goes out.
    pair.a.abort_send(Some(&mid)).unwrap();
    pair.deliver();

    assert!(pair.b_events.saw(&format!("receive_aborted {mid}")));
    assert!(!pair.a_events.saw(&format!("message_delivered {mid}")));
    assert!(
        !pair.a_events.saw(&format!("send_failed {mid} 413")),
        "a local abort is not reported back as a failure"
    );
}

#[test]
fn remote_abort_answers_413_and_stops_the_sender() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"y".repeat(100));
    pair.deliver_a_to_b();
    pair.b.abort_receive(None).unwrap();
    pair.deliver();

    assert!(pair.b_events.saw(&format!("receive_aborted {mid}")));
    assert!(pair.a_events.saw(&format!("send_failed {mid} 413")));
    assert!(!pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn stalled_incoming_transfer_times_out() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"z".repeat(100));
    // Two chunks arrive, then the sender goes silent.
    pair.deliver_a_to_b();

    pair.clock.advance(Duration::from_secs(31));
    pair.b.tick();

    assert!(pair.b_events.saw(&format!("receive_timed_out {mid}")));
    assert!(!pair.b_events.saw(&format!("message_received {mid}")));
}

#[test]
fn missing_final_report_fails_the_send() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"w".repeat(40));

    // A wire that delivers everything except REPORTs.
    loop {
        let mut moved = false;
        for frame in pair.a_out.drain() {
            moved = true;
            pair.b.on_frame(&frame).unwrap();
        }
        for frame in pair.b_out.drain() {
            moved = true;
            if let Ok(Message::Request(req)) = wire::decode(&frame) {
                if req.method == Method::Report {
                    continue;
                }
            }
            pair.a.on_frame(&frame).unwrap();
        }
        if !moved {
            break;
        }
    }
    assert!(pair.a_events.saw(&format!("message_sent {mid}")));

    pair.clock.advance(Duration::from_secs(121));
    pair.a.tick();
    assert!(pair.a_events.saw(&format!("send_failed {mid} 408")));
}

#[test]
fn lost_responses_synthesize_408() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text("vanishes into the void");
    // The wire eats both chunks; no responses ever come back.
    pair.a_out.drain();

    pair.clock.advance(Duration::from_secs(31));
    pair.a.tick();
    assert!(pair.a_events.saw(&format!("send_failed {mid} 408")));
}
