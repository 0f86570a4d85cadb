//! Tests for HTTP/2 CONTINUATION frame handling

use h2_core::connection::{Connection, ConnectionEvent, Role};
use h2_core::config::Config;
use h2_core::frame::{flags, frame_type, CONNECTION_PREFACE};

fn handshake() -> Vec<u8> {
    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend_from_slice(&[0, 0, 0, frame_type::SETTINGS, 0, 0, 0, 0, 0]);
    data
}

fn new_server() -> Connection {
    Connection::new(Role::Server, Config::default()).unwrap()
}

#[test]
fn test_continuation_single_frame() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 3, 1, 0, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x82, 0x86, 0x84]);
    data.extend_from_slice(&[0, 0, 2, 9, 4, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x41, 0x8a]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    let request = events
        .iter()
        .find(|e| matches!(e, ConnectionEvent::Request { .. }))
        .expect("expected a Request event");
    match request {
        ConnectionEvent::Request { stream_id, headers, .. } => {
            assert_eq!(*stream_id, 1);
            assert!(headers.iter().any(|h| h.name == ":authority"));
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_continuation_multiple_frames() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, 1, 0, 0, 0, 0, 3]);
    data.extend_from_slice(&[0x82, 0x86]);
    data.extend_from_slice(&[0, 0, 2, 9, 0, 0, 0, 0, 3]);
    data.extend_from_slice(&[0x84, 0x41]);
    data.extend_from_slice(&[0, 0, 1, 9, 4, 0, 0, 0, 3]);
    data.extend_from_slice(&[0x8a]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert_eq!(events.iter().filter(|e| matches!(e, ConnectionEvent::Request { .. })).count(), 1);
}

#[test]
fn test_continuation_preserves_end_stream() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, 1, 0x1, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x82, 0x86]);
    data.extend_from_slice(&[0, 0, 1, 9, 4, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x84]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    match events.iter().find(|e| matches!(e, ConnectionEvent::Request { .. })).unwrap() {
        ConnectionEvent::Request { end_stream, .. } => assert!(*end_stream),
        _ => unreachable!(),
    }
}

#[test]
fn test_continuation_incremental_delivery() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 0, frame_type::SETTINGS, 0, 0, 0, 0, 0]);
    let (_, events1) = conn.read(&data, 0, data.len()).unwrap();
    assert!(!events1.iter().any(|e| matches!(e, ConnectionEvent::Request { .. })));

    let mut headers_frame = vec![0, 0, 3, 1, 0, 0, 0, 0, 1];
    headers_frame.extend_from_slice(&[0x82, 0x86, 0x84]);
    let (_, events2) = conn.read(&headers_frame, 0, headers_frame.len()).unwrap();
    assert!(events2.is_empty(), "headers without END_HEADERS produce no event yet");

    let mut cont_frame = vec![0, 0, 2, 9, 4, 0, 0, 0, 1];
    cont_frame.extend_from_slice(&[0x41, 0x8a]);
    let (_, events3) = conn.read(&cont_frame, 0, cont_frame.len()).unwrap();
    assert_eq!(events3.iter().filter(|e| matches!(e, ConnectionEvent::Request { .. })).count(), 1);
}

#[test]
fn test_continuation_size_bound_allows_normal_headers() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, frame_type::HEADERS, 0, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x82, 0x86]);
    data.extend_from_slice(&[0, 0, 2, frame_type::CONTINUATION, flags::END_HEADERS, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x84, 0x41]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert_eq!(events.iter().filter(|e| matches!(e, ConnectionEvent::Request { .. })).count(), 1);
}

#[test]
fn test_continuation_wrong_stream_returns_error() {
    // HEADERS on stream 1, CONTINUATION on stream 3 → protocol error (GOAWAY).
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, 1, 0, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x82, 0x86]);
    data.extend_from_slice(&[0, 0, 1, 9, 4, 0, 0, 0, 3]);
    data.extend_from_slice(&[0x84]);

    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
    assert!(conn.is_closed());
}

#[test]
fn test_unexpected_continuation_returns_error() {
    // CONTINUATION without preceding HEADERS → protocol error (GOAWAY).
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 1, 9, 4, 0, 0, 0, 1]);
    data.extend_from_slice(&[0x82, 0x86]);

    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
    assert!(conn.is_closed());
}
