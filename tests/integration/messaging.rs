//! Round trips over a healthy wire.

use bytes::Bytes;
use msrp_core::message::Method;
use msrp_core::{wire, Body, Message};

use crate::{Pair, CHUNK};

#[test]
fn short_text_round_trip() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text("hello");
    pair.deliver();

    let (content_type, body) = pair.b_events.message(&mid).expect("message delivered to B");
    assert_eq!(content_type.as_deref(), Some("text/plain"));
    assert_eq!(body, b"hello");
    assert!(pair.a_events.saw(&format!("message_sent {mid}")));
    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn chunked_text_round_trip() {
    let mut pair = Pair::new();
    pair.connect();

    // Spans seven chunks at the test chunk size.
    let text = "the quick brown fox jumps over the lazy dog, twice over, \
                and then once more for good measure.....";
    assert!(text.len() > 6 * CHUNK);

    let mid = pair.send_text(text);
    pair.deliver();

    let (_, body) = pair.b_events.message(&mid).expect("message delivered to B");
    assert_eq!(body, text.as_bytes());
    assert!(pair.b_events.saw(&format!("transfer_started {mid}")));
    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn binary_round_trips_at_chunk_boundaries() {
    // One byte short of a whole number of chunks, exact, and one over.
    for size in [3 * CHUNK - 1, 3 * CHUNK, 3 * CHUNK + 1] {
        let mut pair = Pair::new();
        pair.connect();

        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let mid = pair
            .a
            .send(
                Some(Body::Binary(Bytes::from(payload.clone()))),
                None,
                None,
                None,
            )
            .unwrap();
        pair.deliver();

        let (content_type, body) = pair
            .b_events
            .message(&mid)
            .unwrap_or_else(|| panic!("{size} byte message delivered"));
        assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(body, payload, "byte-exact at size {size}");
        assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
    }
}

#[test]
fn empty_ping_completes_without_surfacing_at_the_peer() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.a.send(None, None, None, None).unwrap();
    pair.deliver();

    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
    assert_eq!(
        pair.b_events.events(),
        ["established"],
        "a ping is invisible to the receiving application"
    );
}

#[test]
fn concurrent_messages_both_arrive_intact() {
    let mut pair = Pair::new();
    pair.connect();

    let first_text = "first message, long enough to need several chunks on the wire";
    let second_text = "second message, also spanning several chunks of its own";
    let first = pair.send_text(first_text);
    let second = pair.send_text(second_text);
    pair.deliver();

    let (_, body) = pair.b_events.message(&first).expect("first delivered");
    assert_eq!(body, first_text.as_bytes());
    let (_, body) = pair.b_events.message(&second).expect("second delivered");
    assert_eq!(body, second_text.as_bytes());
    assert!(pair.a_events.saw(&format!("message_delivered {first}")));
    assert!(pair.a_events.saw(&format!("message_delivered {second}")));
}

#[test]
fn reports_arriving_out_of_order_still_confirm_delivery() {
    let mut pair = Pair::new();
    pair.connect();

    let text = "three chunks of text, confirmed in reverse";
    assert!(text.len() > 2 * CHUNK && text.len() <= 3 * CHUNK);
    let mid = pair.send_text(text);

    // Shuttle everything except REPORTs, which the wire holds back.
    let mut held = Vec::new();
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
                    held.push(frame);
                    continue;
                }
            }
            pair.a.on_frame(&frame).unwrap();
        }
        if !moved {
            break;
        }
    }
    assert_eq!(held.len(), 3);
    assert!(pair.a_events.saw(&format!("message_sent {mid}")));
    assert!(!pair.a_events.saw(&format!("message_delivered {mid}")));

    // Release them last chunk first.
    for frame in held.into_iter().rev() {
        pair.a.on_frame(&frame).unwrap();
    }
    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn file_metadata_reaches_the_receiver() {
    let mut pair = Pair::new();
    pair.connect();

    let payload = Bytes::from(vec![0u8; 2 * CHUNK]);
    let mid = pair
        .a
        .send(
            Some(Body::Binary(payload)),
            Some("application/pdf".to_string()),
            Some("attachment; filename=\"report.pdf\"".to_string()),
            Some("quarterly report".to_string()),
        )
        .unwrap();
    pair.deliver();

    // The receiver learns the metadata from the first chunk.
    let info = pair.b_events.transfer(&mid).expect("transfer announced");
    assert_eq!(info.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(info.filename.as_deref(), Some("report.pdf"));
    assert_eq!(info.description.as_deref(), Some("quarterly report"));
    assert!(info.is_file);
    assert_eq!(info.total, 2 * CHUNK as i64);
}

#[test]
fn content_type_outside_the_accept_list_is_refused() {
    let mut pair = Pair::with_config(|c| {
        c.media.accept_types = vec!["text/plain".to_string()];
    });
    pair.connect();

    let mid = pair
        .a
        .send(
            Some(Body::Binary(Bytes::from(vec![7u8; 4 * CHUNK]))),
            None,
            None,
            None,
        )
        .unwrap();
    pair.deliver();

    assert!(pair.a_events.saw(&format!("send_failed {mid} 415")));
    assert_eq!(
        pair.b_events.events(),
        ["established"],
        "the application is never consulted for a type the config refuses"
    );
}

#[test]
fn rejected_transfer_fails_the_send_with_415() {
    let mut pair = Pair::new();
    pair.connect();
    pair.b_events.reject_all();

    let mid = pair.send_text("unwanted content that spans more than one chunk here");
    pair.deliver();

    assert!(pair.a_events.saw(&format!("send_failed {mid} 415")));
    assert!(pair.b_events.message(&mid).is_none());
}
