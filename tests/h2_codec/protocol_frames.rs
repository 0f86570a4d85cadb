//! Tests for connection-level PING, WINDOW_UPDATE and SETTINGS handling

use h2_core::config::Config;
use h2_core::connection::{Connection, ConnectionEvent, Role};
use h2_core::frame::{self, frame_type, FrameHeader, CONNECTION_PREFACE, FRAME_HEADER_LEN};
use h2_core::io::WriteOperation;

fn new_server() -> Connection {
    Connection::new(Role::Server, Config::default()).unwrap()
}

fn handshake() -> Vec<u8> {
    let mut data = CONNECTION_PREFACE.to_vec();
    data.extend_from_slice(&[0, 0, 0, frame_type::SETTINGS, 0, 0, 0, 0, 0]);
    data
}

fn drain(conn: &mut Connection) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        match conn.next_write_operation() {
            WriteOperation::Write(batches) => {
                let total: u64 = batches.iter().map(|b| b.len() as u64).sum();
                for b in &batches {
                    out.extend_from_slice(b);
                }
                conn.report_write_result(Ok(total)).unwrap();
            }
            WriteOperation::Yield | WriteOperation::Close(_) => break,
        }
    }
    out
}

#[test]
fn test_ping_frame_is_echoed() {
    let mut conn = new_server();
    let mut data = handshake();
    let mut frame = vec![0, 0, 8, frame_type::PING, 0, 0, 0, 0, 0];
    frame.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    data.extend_from_slice(&frame);

    conn.read(&data, 0, data.len()).unwrap();
    let out = drain(&mut conn);
    // find a PING frame with the ACK flag among the output.
    let mut offset = 0;
    let mut found_ack = false;
    while offset + FRAME_HEADER_LEN <= out.len() {
        let hdr = FrameHeader::parse(&out[offset..]).unwrap();
        let body_start = offset + FRAME_HEADER_LEN;
        let body_end = body_start + hdr.length as usize;
        if hdr.frame_type == frame_type::PING && hdr.flags & frame::flags::ACK != 0 {
            assert_eq!(&out[body_start..body_end], &[1, 2, 3, 4, 5, 6, 7, 8]);
            found_ack = true;
        }
        offset = body_end;
    }
    assert!(found_ack, "expected an echoed PING ACK in the output");
}

#[test]
fn test_ping_ack_matches_outstanding_ping() {
    let mut conn = new_server();
    let data = handshake();
    conn.read(&data, 0, data.len()).unwrap();
    drain(&mut conn);

    let opaque = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE];
    conn.send_ping(opaque);
    drain(&mut conn);

    let mut ack = vec![0, 0, 8, frame_type::PING, frame::flags::ACK, 0, 0, 0, 0];
    ack.extend_from_slice(&opaque);
    let (_, events) = conn.read(&ack, 0, ack.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::PingAcked { .. })));
    assert!(conn.last_ping_rtt().is_some());
}

#[test]
fn test_window_update_parsing() {
    let mut conn = new_server();
    let mut data = handshake();
    let mut frame = vec![0, 0, 4, frame_type::WINDOW_UPDATE, 0, 0, 0, 0, 5];
    frame.extend_from_slice(&0x00010000u32.to_be_bytes());
    data.extend_from_slice(&frame);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::WindowUpdate { stream_id: 5 })));
}

#[test]
fn test_window_update_connection_level() {
    let mut conn = new_server();
    let mut data = handshake();
    let mut frame = vec![0, 0, 4, frame_type::WINDOW_UPDATE, 0, 0, 0, 0, 0];
    frame.extend_from_slice(&0x00100000u32.to_be_bytes());
    data.extend_from_slice(&frame);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::WindowUpdate { stream_id: 0 })));
}

#[test]
fn test_settings_ack_clears_pending_flag_and_surfaces_event() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 0, frame_type::SETTINGS, frame::flags::ACK, 0, 0, 0, 0]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::SettingsAcked)));
}

#[test]
fn test_settings_with_various_params_are_applied_without_error() {
    let mut conn = new_server();
    let mut data = handshake();
    let mut frame = vec![0, 0, 18, frame_type::SETTINGS, 0, 0, 0, 0, 0];
    frame.extend_from_slice(&[0, 1, 0x00, 0x00, 0x20, 0x00]); // HEADER_TABLE_SIZE
    frame.extend_from_slice(&[0, 4, 0x00, 0x00, 0xFF, 0xFF]); // INITIAL_WINDOW_SIZE
    frame.extend_from_slice(&[0, 5, 0x00, 0x00, 0x40, 0x00]); // MAX_FRAME_SIZE
    data.extend_from_slice(&frame);
    conn.read(&data, 0, data.len()).unwrap();

    // The engine always responds to a non-ACK SETTINGS with an ACK of its own.
    let out = drain(&mut conn);
    let mut offset = 0;
    let mut saw_ack = false;
    while offset + FRAME_HEADER_LEN <= out.len() {
        let hdr = FrameHeader::parse(&out[offset..]).unwrap();
        if hdr.frame_type == frame_type::SETTINGS && hdr.flags & frame::flags::ACK != 0 {
            saw_ack = true;
        }
        offset += FRAME_HEADER_LEN + hdr.length as usize;
    }
    assert!(saw_ack);
}

#[test]
fn test_settings_parsing_unknown_setting_ignored() {
    let mut conn = new_server();
    let mut data = handshake();
    let mut frame = vec![0, 0, 12, frame_type::SETTINGS, 0, 0, 0, 0, 0];
    frame.extend_from_slice(&[0, 0xFF, 0, 0, 0, 42]);
    frame.extend_from_slice(&[0, 4, 0, 0, 0xFF, 0xFF]);
    data.extend_from_slice(&frame);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(!events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}

#[test]
fn test_priority_frame_ignored() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 5, frame_type::PRIORITY, 0, 0, 0, 0, 1, 0, 0, 0, 0, 128]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_unknown_frame_type_ignored() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 4, 0xFF, 0, 0, 0, 0, 1, 1, 2, 3, 4]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.is_empty());
}

#[test]
fn test_window_update_too_short_returns_error() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, frame_type::WINDOW_UPDATE, 0, 0, 0, 0, 1, 0, 1]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}

#[test]
fn test_ping_too_short_returns_error() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 4, frame_type::PING, 0, 0, 0, 0, 0, 1, 2, 3, 4]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}

#[test]
fn test_goaway_too_short_returns_error() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 4, frame_type::GOAWAY, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}

#[test]
fn test_rst_stream_too_short_returns_error() {
    let mut conn = new_server();
    let mut data = handshake();
    data.extend_from_slice(&[0, 0, 2, frame_type::RST_STREAM, 0, 0, 0, 0, 1, 0, 1]);
    let (_, events) = conn.read(&data, 0, data.len()).unwrap();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::GoAway { .. })));
}
