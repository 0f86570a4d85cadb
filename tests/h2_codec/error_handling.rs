//! Tests for connection-level error handling

use h2_core::config::Config;
use h2_core::connection::{Connection, ConnectionEvent, Role};
use h2_core::frame::CONNECTION_PREFACE;

fn handshake() -> Vec<u8> {
    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend_from_slice(&[0, 0, 0, 4, 0, 0, 0, 0, 0]);
    data
}

fn new_server() -> Connection {
    Connection::new(Role::Server, Config::default()).unwrap()
}

fn assert_goes_fatal(conn: &mut Connection, frame: &[u8]) {
    let mut data = handshake();
    data.extend_from_slice(frame);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(
        events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })),
        "expected the malformed frame to trigger a GOAWAY"
    );
    assert!(conn.is_closed());
}

#[test]
fn test_window_update_too_short_returns_error() {
    let mut conn = new_server();
    assert_goes_fatal(&mut conn, &[0, 0, 2, 8, 0, 0, 0, 0, 1, 0, 0]);
}

#[test]
fn test_ping_too_short_returns_error() {
    let mut conn = new_server();
    assert_goes_fatal(&mut conn, &[0, 0, 4, 6, 0, 0, 0, 0, 0, 1, 2, 3, 4]);
}

#[test]
fn test_goaway_too_short_returns_error() {
    let mut conn = new_server();
    assert_goes_fatal(&mut conn, &[0, 0, 4, 7, 0, 0, 0, 0, 0, 0, 0, 0, 5]);
}

#[test]
fn test_rst_stream_too_short_returns_error() {
    let mut conn = new_server();
    assert_goes_fatal(&mut conn, &[0, 0, 2, 3, 0, 0, 0, 0, 1, 0, 0]);
}

#[test]
fn test_padded_data_frame_invalid_padding() {
    let mut conn = new_server();
    // PADDED DATA frame on stream 1, but no HEADERS ever opened it — and
    // padding (10) exceeds the 5-byte remaining payload either way.
    let mut frame = vec![0, 0, 6, 0, 0x8, 0, 0, 0, 1];
    frame.push(10);
    frame.extend_from_slice(b"hello");
    assert_goes_fatal(&mut conn, &frame);
}

#[test]
fn test_headers_with_priority_flag() {
    let mut conn = new_server();
    let mut data = handshake();
    // HEADERS with PRIORITY flag (0x24 = END_HEADERS | PRIORITY) and END_STREAM unset.
    let mut frame = vec![0, 0, 7, 1, 0x24, 0, 0, 0, 1];
    frame.extend_from_slice(&[0, 0, 0, 0]); // dependency
    frame.push(255); // weight
    frame.extend_from_slice(&[0x82, 0x86]); // :method GET, :scheme https
    data.extend_from_slice(&frame);

    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::Request { .. })));
}
