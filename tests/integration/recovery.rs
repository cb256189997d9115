//! Transport loss, duplicate delivery, and teardown.

use crate::Pair;

#[test]
fn reconnect_resumes_from_the_acknowledged_position() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"r".repeat(100));
    pair.deliver_a_to_b();
    // Acks for the first chunks come back and more chunks get pumped.
    pair.deliver_b_to_a();

    // The link drops, taking the pumped-but-undelivered chunks with it.
    pair.a_out.drain();
    pair.a.on_close();
    pair.a.on_open();

    pair.deliver();
    let (_, body) = pair
        .b_events
        .message(&mid)
        .expect("message survives the reconnect");
    assert_eq!(body, "r".repeat(100).as_bytes());
    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn duplicate_chunks_do_not_corrupt_the_message() {
    let mut pair = Pair::new();
    pair.connect();

    let text = "duplicated chunk delivery must stay byte exact";
    let mid = pair.send_text(text);
    let frames = pair.a_out.drain();
    for frame in &frames {
        pair.b.on_frame(frame).unwrap();
    }
    // The network delivers the first chunk a second time.
    pair.b.on_frame(&frames[0]).unwrap();
    pair.deliver();

    let (_, body) = pair.b_events.message(&mid).expect("delivered");
    assert_eq!(body, text.as_bytes());
    assert!(pair.a_events.saw(&format!("message_delivered {mid}")));
}

#[test]
fn close_aborts_in_progress_transfers() {
    let mut pair = Pair::new();
    pair.connect();

    let mid = pair.send_text(&"c".repeat(100));
    pair.a.close();
    assert!(pair.a_events.saw("closed"));
    assert!(pair.a.send(None, None, None, None).is_err());

    pair.deliver();
    assert!(pair.b_events.saw(&format!("receive_aborted {mid}")));
}
