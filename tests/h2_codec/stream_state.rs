//! Tests for connection-level stream lifecycle management

use h2_core::config::Config;
use h2_core::connection::{Connection, ConnectionEvent, Role};
use h2_core::frame::{self, frame_type, CONNECTION_PREFACE};
use h2_core::hpack::{Header, HpackEncoder};

fn new_server(config: Config) -> Connection {
    Connection::new(Role::Server, config).unwrap()
}

fn handshake() -> Vec<u8> {
    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend_from_slice(&[0, 0, 0, frame_type::SETTINGS, 0, 0, 0, 0, 0]);
    data
}

fn get_request(stream_id: u32) -> Vec<u8> {
    let mut encoder = HpackEncoder::new(4096);
    let block = encoder.encode(&[
        Header::new(":method", "GET"),
        Header::new(":scheme", "https"),
        Header::new(":authority", "x"),
        Header::new(":path", "/"),
    ]);
    frame::serialize(&frame::Frame::Headers {
        stream_id,
        header_block: block,
        end_stream: true,
        end_headers: true,
        priority: None,
        pad_len: 0,
    })
}

#[test]
fn test_stream_closes_after_full_round_trip() {
    let mut conn = new_server(Config::default());
    let mut data = handshake();
    data.extend(get_request(1));
    conn.read(&data, 0, data.len()).unwrap();
    conn.respond_with_string(1, 200, Vec::new(), b"ok".to_vec()).unwrap();

    // A second request on a lower/equal stream id now violates RFC 7540's
    // monotonicity requirement — the stream slot was freed by closure, but
    // the id space itself only moves forward.
    let mut replay = get_request(1);
    let (_, events) = conn.read(&mut replay, 0, replay.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}

#[test]
fn test_rst_stream_frees_concurrent_stream_slot() {
    let config = Config::default().with_max_concurrent_streams(1);
    let mut conn = new_server(config);
    let mut data = handshake();
    data.extend(get_request(1));
    conn.read(&data, 0, data.len()).unwrap();

    let rst = frame::serialize(&frame::Frame::RstStream { stream_id: 1, error_code: 0x8 });
    let (_, events) = conn.read(&rst, 0, rst.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::StreamReset { stream_id: 1, .. })));

    // With the slot freed, a third stream is now admissible.
    let next = get_request(3);
    let (_, events) = conn.read(&next, 0, next.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::Request { stream_id: 3, .. })));
}

#[test]
fn test_max_concurrent_streams_refuses_excess_stream() {
    let config = Config::default().with_max_concurrent_streams(1);
    let mut conn = new_server(config);
    let mut data = handshake();
    // Stream 1 never ends (no END_STREAM), so it stays active and occupies
    // the single concurrency slot.
    let mut encoder = HpackEncoder::new(4096);
    let block = encoder.encode(&[
        Header::new(":method", "GET"),
        Header::new(":scheme", "https"),
        Header::new(":authority", "x"),
        Header::new(":path", "/"),
    ]);
    data.extend(frame::serialize(&frame::Frame::Headers {
        stream_id: 1,
        header_block: block,
        end_stream: false,
        end_headers: true,
        priority: None,
        pad_len: 0,
    }));
    conn.read(&data, 0, data.len()).unwrap();

    let second = get_request(3);
    let (_, events) = conn.read(&second, 0, second.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::StreamReset { stream_id: 3, .. })));
}

#[test]
fn test_rst_stream_on_unknown_stream_is_connection_fatal() {
    // RFC 7540 §6.4: RST_STREAM on an idle stream is a connection error,
    // not a no-op — stream id 999 was never opened here.
    let mut conn = new_server(Config::default());
    let mut data = handshake();
    data.extend(frame::serialize(&frame::Frame::RstStream { stream_id: 999, error_code: 0x8 }));
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
    assert!(conn.is_closed());
}
