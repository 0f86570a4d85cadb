//! The connection state machine (spec §4.10): settings negotiation, stream
//! multiplexing, flow control, GOAWAY/PING handling, and error promotion.
//! Everything below this module is pure data transformation; this is the
//! only place state actually lives and mutates.
//!
//! Per spec §9's design note ("connection state machine's step function
//! returns either a list of outbound events or an error classification"),
//! [`Connection::read`]/[`Connection::read_eof`] don't invoke application
//! callbacks directly — they return a batch of [`ConnectionEvent`]s, and
//! the caller drives response operations (`respond_with_string`, `push`,
//! ...) back into the `Connection` by stream id. This sidesteps handing out
//! a borrowed `StreamContext` that would alias `&mut Connection` while a
//! callback is running, while still matching the request/response-handler
//! contract of spec §6.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{Error, ErrorCode, Result};
use crate::flow_control::FlowWindow;
use crate::frame::{self, Frame, FrameHeader, CONNECTION_PREFACE, FRAME_HEADER_LEN};
use crate::hpack::{Header, HpackDecoder, HpackEncoder};
use crate::io::{Reader, WriteOperation, Writer};
use crate::priority::PriorityTree;
use crate::settings::Settings;
use crate::stream::{validate_peer_stream_id, Direction, Event as StreamEvent, Stream};

/// Which end of the connection this engine instance plays (spec §9 open
/// question: client is a full mirror of server behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// One outbound notification produced by a batch of reads.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A complete HEADERS block (request on the server, response on the
    /// client, or a pushed request on either once PUSH_PROMISE lands).
    Request {
        stream_id: u32,
        method: Option<String>,
        target: Option<String>,
        headers: Vec<Header>,
        end_stream: bool,
    },
    Data {
        stream_id: u32,
        data: Vec<u8>,
        end_stream: bool,
    },
    Trailers {
        stream_id: u32,
        headers: Vec<Header>,
    },
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        headers: Vec<Header>,
    },
    StreamReset {
        stream_id: u32,
        error_code: ErrorCode,
    },
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: Vec<u8>,
    },
    SettingsAcked,
    PingAcked { rtt: Duration },
    WindowUpdate { stream_id: u32 },
}

struct HeaderBlockInProgress {
    stream_id: u32,
    buffer: Vec<u8>,
    end_stream: bool,
    promised_stream_id: Option<u32>,
}

/// Find a pseudo-header's value by name (e.g. `:method`, `:path`).
pub fn find_pseudo<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers.iter().find(|h| h.name == name).map(|h| h.value.as_str())
}

pub struct Connection {
    role: Role,
    config: Config,

    reader: Reader,
    writer: Writer,

    local_settings: Settings,
    local_settings_ack_pending: bool,
    peer_settings: Settings,

    preface_sent: bool,
    preface_received: bool,

    streams: HashMap<u32, Stream>,
    last_peer_stream_id: u32,
    last_local_stream_id: u32,

    conn_send_window: FlowWindow,
    conn_recv_window: FlowWindow,
    /// Connection-level counterpart to `Stream::recv_unreleased`.
    conn_recv_unreleased: u32,

    hpack_encoder: HpackEncoder,
    hpack_decoder: HpackDecoder,
    priority: PriorityTree,

    header_block: Option<HeaderBlockInProgress>,

    goaway_sent: bool,
    goaway_received: bool,
    closed: bool,

    outstanding_ping: Option<([u8; 8], Instant)>,
    last_ping_rtt: Option<Duration>,

    /// Whether the most recent `write_body_chunk` call for a streaming
    /// response asked for END_STREAM once the buffered body drains.
    pending_end_stream: HashMap<u32, bool>,
}

const CONNECTION_INITIAL_WINDOW: u32 = 65535;

/// Minimum released-bytes floor for the recv-window replenishment policy
/// (spec §4.8: "emit when released bytes >= max(threshold, current_window/2)").
const WINDOW_UPDATE_THRESHOLD: u32 = 1024;

impl Connection {
    pub fn new(role: Role, config: Config) -> Result<Self> {
        config.validate()?;
        let local_settings = Settings {
            max_concurrent_streams: config.max_concurrent_streams,
            initial_window_size: config.initial_window_size,
            ..Settings::default()
        };
        let mut conn = Self {
            role,
            config,
            reader: Reader::new(),
            writer: Writer::new(),
            local_settings,
            local_settings_ack_pending: false,
            peer_settings: Settings::default(),
            preface_sent: false,
            preface_received: false,
            streams: HashMap::new(),
            last_peer_stream_id: 0,
            last_local_stream_id: 0,
            conn_send_window: FlowWindow::new(CONNECTION_INITIAL_WINDOW),
            conn_recv_window: FlowWindow::new(CONNECTION_INITIAL_WINDOW),
            conn_recv_unreleased: 0,
            hpack_encoder: HpackEncoder::new(local_settings.header_table_size as usize),
            hpack_decoder: HpackDecoder::new(local_settings.header_table_size as usize),
            priority: PriorityTree::new(),
            header_block: None,
            goaway_sent: false,
            goaway_received: false,
            closed: false,
            outstanding_ping: None,
            last_ping_rtt: None,
            pending_end_stream: HashMap::new(),
        };
        if role == Role::Client {
            conn.send_preface_and_settings();
        }
        Ok(conn)
    }

    fn send_preface_and_settings(&mut self) {
        if self.role == Role::Client && !self.preface_sent {
            self.writer.enqueue(CONNECTION_PREFACE.to_vec());
            self.preface_sent = true;
        }
        let params = self.local_settings.to_wire_params();
        self.writer.enqueue(frame::serialize(&Frame::Settings {
            ack: false,
            params,
        }));
        self.local_settings_ack_pending = true;
        debug!(role = ?self.role, "sent initial SETTINGS");
    }

    /// Send the server's initial SETTINGS; called lazily once the client
    /// preface has been observed (spec §4.10: "the server expects the
    /// 24-octet client connection preface... followed by a SETTINGS
    /// frame").
    fn ensure_server_settings_sent(&mut self) {
        if self.role == Role::Server && !self.preface_sent {
            let params = self.local_settings.to_wire_params();
            self.writer.enqueue(frame::serialize(&Frame::Settings {
                ack: false,
                params,
            }));
            self.local_settings_ack_pending = true;
            self.preface_sent = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn last_ping_rtt(&self) -> Option<Duration> {
        self.last_ping_rtt
    }

    pub fn shutdown(&mut self) {
        if !self.goaway_sent {
            self.send_goaway(ErrorCode::NoError, Vec::new());
        }
        self.writer.request_close();
    }

    /// Feed `len` bytes from `buf[off..]` into the connection, parsing and
    /// dispatching as many complete frames as are available. Mirrors
    /// `read(buf, off, len)` (spec §4.11/§6).
    pub fn read(&mut self, buf: &[u8], off: usize, len: usize) -> Result<(usize, Vec<ConnectionEvent>)> {
        let consumed = self.reader.fill(buf, off, len)?;
        let events = self.pump()?;
        Ok((consumed, events))
    }

    pub fn read_eof(&mut self) -> Result<Vec<ConnectionEvent>> {
        self.reader.mark_eof();
        let mut events = self.pump()?;
        if let Err(e) = self.reader.check_eof_clean() {
            events.extend(self.fail_connection(e));
        }
        Ok(events)
    }

    fn pump(&mut self) -> Result<Vec<ConnectionEvent>> {
        let mut events = Vec::new();

        if self.role == Role::Server && !self.preface_received {
            let pending = self.reader.pending();
            if pending.len() < CONNECTION_PREFACE.len() {
                return Ok(events);
            }
            if &pending[..CONNECTION_PREFACE.len()] != CONNECTION_PREFACE {
                events.extend(self.fail_connection(Error::protocol("bad connection preface")));
                return Ok(events);
            }
            self.reader.consume(CONNECTION_PREFACE.len());
            self.preface_received = true;
            self.ensure_server_settings_sent();
        }

        loop {
            let pending = self.reader.pending();
            if pending.len() < FRAME_HEADER_LEN {
                break;
            }
            let header = FrameHeader::parse(pending)?;
            if header.length > self.local_settings.max_frame_size {
                let total = FRAME_HEADER_LEN + header.length as usize;
                // Only resync past the oversized frame when it's already
                // fully buffered and addressed to a stream we're tracking;
                // otherwise there's no safe way to know where the next
                // frame starts, so the whole connection goes down (RFC
                // 7540 §4.2 permits this when resynchronization isn't
                // attempted).
                if pending.len() >= total && self.streams.contains_key(&header.stream_id) {
                    self.reader.consume(total);
                    events.extend(self.fail_stream(
                        header.stream_id,
                        Error::frame_size("frame length exceeds local MAX_FRAME_SIZE"),
                    ));
                    continue;
                }
                events.extend(self.fail_connection(Error::frame_size(
                    "frame length exceeds local MAX_FRAME_SIZE",
                )));
                return Ok(events);
            }
            let total = FRAME_HEADER_LEN + header.length as usize;
            if pending.len() < total {
                break;
            }
            let payload = pending[FRAME_HEADER_LEN..total].to_vec();
            self.reader.consume(total);

            match frame::parse_payload(&header, &payload) {
                Ok(f) => match self.dispatch(f) {
                    Ok(mut new_events) => events.append(&mut new_events),
                    Err(e) => {
                        events.extend(self.handle_error(e));
                        if self.closed {
                            return Ok(events);
                        }
                    }
                },
                Err(e) => {
                    events.extend(self.handle_error(e));
                    if self.closed {
                        return Ok(events);
                    }
                }
            }
        }

        self.drain_scheduler();
        Ok(events)
    }

    fn handle_error(&mut self, e: Error) -> Vec<ConnectionEvent> {
        match e {
            Error::StreamClosed(id) | Error::RefusedStream(id) | Error::Cancel(id) => {
                self.fail_stream(id, e)
            }
            other => self.fail_connection(other),
        }
    }

    fn dispatch(&mut self, f: Frame) -> Result<Vec<ConnectionEvent>> {
        trace!(frame_type = f.frame_type(), stream_id = f.stream_id(), "dispatch frame");

        if let Some(in_progress) = &self.header_block {
            let ok = matches!(&f, Frame::Continuation { stream_id, .. } if *stream_id == in_progress.stream_id);
            if !ok {
                return Err(Error::protocol(
                    "non-CONTINUATION frame interleaved inside a header block",
                ));
            }
        }

        match f {
            Frame::Settings { ack, params } => self.handle_settings(ack, params),
            Frame::Headers {
                stream_id,
                header_block,
                end_stream,
                end_headers,
                priority,
                ..
            } => {
                if let Some(p) = priority {
                    self.priority.set_priority(stream_id, p.dependency, p.weight, p.exclusive);
                }
                self.begin_header_block(stream_id, header_block, end_stream, end_headers, None)
            }
            Frame::Continuation {
                stream_id,
                header_block,
                end_headers,
            } => self.continue_header_block(stream_id, header_block, end_headers),
            Frame::PushPromise {
                stream_id,
                promised_stream_id,
                header_block,
                end_headers,
                ..
            } => self.begin_header_block(stream_id, header_block, false, end_headers, Some(promised_stream_id)),
            Frame::Data {
                stream_id,
                data,
                end_stream,
                pad_len,
            } => self.handle_data(stream_id, data, end_stream, pad_len),
            Frame::Priority { stream_id, update } => {
                self.priority.set_priority(stream_id, update.dependency, update.weight, update.exclusive);
                Ok(Vec::new())
            }
            Frame::RstStream { stream_id, error_code } => {
                let stream = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or_else(|| Error::protocol("RST_STREAM on an idle stream"))?;
                stream.apply(Direction::Recv, StreamEvent::RstStream)?;
                self.streams.remove(&stream_id);
                self.priority.remove(stream_id);
                Ok(vec![ConnectionEvent::StreamReset {
                    stream_id,
                    error_code: ErrorCode::from_wire(error_code),
                }])
            }
            Frame::Ping { ack, opaque } => self.handle_ping(ack, opaque),
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                self.goaway_received = true;
                Ok(vec![ConnectionEvent::GoAway {
                    last_stream_id,
                    error_code: ErrorCode::from_wire(error_code),
                    debug_data,
                }])
            }
            Frame::WindowUpdate { stream_id, increment } => self.handle_window_update(stream_id, increment),
            Frame::Unknown { frame_type, .. } => {
                warn!(frame_type, "ignoring unknown frame type");
                Ok(Vec::new())
            }
        }
    }

    fn handle_settings(&mut self, ack: bool, params: Vec<(u16, u32)>) -> Result<Vec<ConnectionEvent>> {
        if ack {
            self.local_settings_ack_pending = false;
            return Ok(vec![ConnectionEvent::SettingsAcked]);
        }

        let mut window_delta: Option<i64> = None;
        let prev_header_table_size = self.peer_settings.header_table_size;
        for (id, value) in params {
            if let Some(prev_initial) = self.peer_settings.apply(id, value) {
                window_delta = Some(value as i64 - prev_initial as i64);
            }
        }
        if self.peer_settings.header_table_size != prev_header_table_size {
            self.hpack_encoder
                .set_peer_header_table_size(self.peer_settings.header_table_size as usize);
        }
        if let Some(delta) = window_delta {
            for stream in self.streams.values_mut() {
                stream.send_window.apply_initial_window_delta(delta)?;
            }
        }

        self.writer.enqueue(frame::serialize(&Frame::Settings {
            ack: true,
            params: Vec::new(),
        }));
        debug!("acked peer SETTINGS");
        Ok(Vec::new())
    }

    fn begin_header_block(
        &mut self,
        stream_id: u32,
        block: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
        promised_stream_id: Option<u32>,
    ) -> Result<Vec<ConnectionEvent>> {
        if end_headers {
            self.finish_header_block(stream_id, block, end_stream, promised_stream_id)
        } else {
            self.header_block = Some(HeaderBlockInProgress {
                stream_id,
                buffer: block,
                end_stream,
                promised_stream_id,
            });
            Ok(Vec::new())
        }
    }

    fn continue_header_block(
        &mut self,
        stream_id: u32,
        chunk: Vec<u8>,
        end_headers: bool,
    ) -> Result<Vec<ConnectionEvent>> {
        let mut in_progress = self
            .header_block
            .take()
            .ok_or_else(|| Error::protocol("CONTINUATION with no preceding HEADERS"))?;
        if in_progress.stream_id != stream_id {
            return Err(Error::protocol("CONTINUATION stream id mismatch"));
        }
        in_progress.buffer.extend_from_slice(&chunk);
        if end_headers {
            self.finish_header_block(
                in_progress.stream_id,
                in_progress.buffer,
                in_progress.end_stream,
                in_progress.promised_stream_id,
            )
        } else {
            self.header_block = Some(in_progress);
            Ok(Vec::new())
        }
    }

    fn finish_header_block(
        &mut self,
        stream_id: u32,
        block: Vec<u8>,
        end_stream: bool,
        promised_stream_id: Option<u32>,
    ) -> Result<Vec<ConnectionEvent>> {
        let headers = self.hpack_decoder.decode(&block)?;

        if let Some(promised) = promised_stream_id {
            self.streams.insert(promised, Stream::new(promised, self.local_settings.initial_window_size));
            if let Some(s) = self.streams.get_mut(&promised) {
                s.apply(Direction::Recv, StreamEvent::PushPromise)?;
            }
            return Ok(vec![ConnectionEvent::PushPromise {
                stream_id,
                promised_stream_id: promised,
                headers,
            }]);
        }

        let expect_peer_odd = self.role == Role::Server;
        let is_new = !self.streams.contains_key(&stream_id);
        if is_new {
            validate_peer_stream_id(stream_id, expect_peer_odd, self.last_peer_stream_id)?;
            self.last_peer_stream_id = stream_id;

            let active_peer_streams = self
                .streams
                .values()
                .filter(|s| !s.state.is_closed())
                .count() as u32;
            if active_peer_streams >= self.local_settings.max_concurrent_streams {
                return Err(Error::RefusedStream(stream_id));
            }
            self.streams
                .insert(stream_id, Stream::new(stream_id, self.local_settings.initial_window_size));
            if !self.priority.has_node(stream_id) {
                self.priority.set_priority(stream_id, crate::priority::ROOT, 15, false);
            }
        }

        let stream = self.streams.get_mut(&stream_id).expect("just inserted or existing");
        if stream.descriptor.headers.is_empty() {
            stream.apply(Direction::Recv, StreamEvent::Headers { end_stream })?;
            stream.descriptor.headers = headers.clone();
        } else {
            // A second HEADERS block on an already-open stream is trailers.
            stream.descriptor.trailers = Some(headers.clone());
            if end_stream {
                stream.apply(Direction::Recv, StreamEvent::EndStream)?;
            }
            return Ok(vec![ConnectionEvent::Trailers { stream_id, headers }]);
        }

        let method = find_pseudo(&headers, ":method").map(str::to_string);
        let target = find_pseudo(&headers, ":path").map(str::to_string);
        Ok(vec![ConnectionEvent::Request {
            stream_id,
            method,
            target,
            headers,
            end_stream,
        }])
    }

    fn handle_data(
        &mut self,
        stream_id: u32,
        data: Vec<u8>,
        end_stream: bool,
        pad_len: u8,
    ) -> Result<Vec<ConnectionEvent>> {
        let consumed = data.len() as u32 + pad_len as u32;
        if consumed as i64 > self.conn_recv_window.recv_window {
            return Err(Error::flow_control(
                "DATA frame exceeds the connection's recv window",
            ));
        }
        // The bytes were received over the wire regardless of what happens
        // to the specific stream below, so the connection-level window is
        // committed as soon as it clears the bound check.
        self.conn_recv_window.consume_recv(consumed);

        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or(Error::protocol("DATA frame on an idle stream"))?;
        if !stream.state.can_recv() {
            return Err(Error::StreamClosed(stream_id));
        }
        if consumed as i64 > stream.recv_window.recv_window {
            return Err(Error::flow_control(
                "DATA frame exceeds the stream's recv window",
            ));
        }
        stream.recv_window.consume_recv(consumed);
        stream.apply(Direction::Recv, StreamEvent::Data { end_stream })?;

        // The engine hands received body bytes straight to the caller as a
        // `ConnectionEvent::Data` rather than holding them in an internal
        // body buffer, so they count as "released" the moment the frame is
        // accepted (spec §4.8's release policy applied at the only point
        // this engine ever frees recv-window credit). Bytes that don't
        // clear the threshold stay on the accumulator for the next DATA
        // frame instead of being dropped.
        stream.recv_unreleased += consumed;
        if let Some(inc) = stream
            .recv_window
            .on_bytes_released(stream.recv_unreleased, WINDOW_UPDATE_THRESHOLD)
        {
            stream.recv_unreleased = 0;
            self.writer.enqueue(frame::serialize(&Frame::WindowUpdate {
                stream_id,
                increment: inc,
            }));
        }
        self.conn_recv_unreleased += consumed;
        if let Some(inc) = self
            .conn_recv_window
            .on_bytes_released(self.conn_recv_unreleased, WINDOW_UPDATE_THRESHOLD)
        {
            self.conn_recv_unreleased = 0;
            self.writer.enqueue(frame::serialize(&Frame::WindowUpdate {
                stream_id: 0,
                increment: inc,
            }));
        }

        Ok(vec![ConnectionEvent::Data {
            stream_id,
            data,
            end_stream,
        }])
    }

    fn handle_ping(&mut self, ack: bool, opaque: [u8; 8]) -> Result<Vec<ConnectionEvent>> {
        if !ack {
            self.writer.enqueue(frame::serialize(&Frame::Ping { ack: true, opaque }));
            return Ok(Vec::new());
        }
        match self.outstanding_ping.take() {
            Some((sent_payload, sent_at)) if sent_payload == opaque => {
                let rtt = sent_at.elapsed();
                self.last_ping_rtt = Some(rtt);
                Ok(vec![ConnectionEvent::PingAcked { rtt }])
            }
            Some(other) => {
                self.outstanding_ping = Some(other);
                Err(Error::protocol("PING ACK does not match an outstanding ping"))
            }
            None => Err(Error::protocol("unmatched PING ACK")),
        }
    }

    fn handle_window_update(&mut self, stream_id: u32, increment: u32) -> Result<Vec<ConnectionEvent>> {
        if stream_id == 0 {
            self.conn_send_window.apply_window_update(increment)?;
        } else if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.send_window.apply_window_update(increment)?;
        }
        self.drain_scheduler();
        Ok(vec![ConnectionEvent::WindowUpdate { stream_id }])
    }

    /// Send a PING with a fresh opaque payload, for RTT measurement (spec
    /// §9 supplement: surfaced via [`Connection::last_ping_rtt`], no action
    /// taken on it).
    pub fn send_ping(&mut self, opaque: [u8; 8]) {
        self.writer.enqueue(frame::serialize(&Frame::Ping { ack: false, opaque }));
        self.outstanding_ping = Some((opaque, Instant::now()));
    }

    fn send_goaway(&mut self, code: ErrorCode, debug_data: Vec<u8>) {
        self.writer.enqueue(frame::serialize(&Frame::GoAway {
            last_stream_id: self.last_peer_stream_id,
            error_code: code.to_wire(),
            debug_data,
        }));
        self.goaway_sent = true;
    }

    fn fail_connection(&mut self, e: Error) -> Vec<ConnectionEvent> {
        warn!(error = %e, "connection-fatal error, sending GOAWAY");
        let code = e.code();
        self.send_goaway(code, Vec::new());
        self.writer.request_close();
        self.closed = true;
        vec![ConnectionEvent::GoAway {
            last_stream_id: self.last_peer_stream_id,
            error_code: code,
            debug_data: Vec::new(),
        }]
    }

    fn fail_stream(&mut self, stream_id: u32, e: Error) -> Vec<ConnectionEvent> {
        let code = e.code();
        self.writer.enqueue(frame::serialize(&Frame::RstStream {
            stream_id,
            error_code: code.to_wire(),
        }));
        self.streams.remove(&stream_id);
        self.priority.remove(stream_id);
        vec![ConnectionEvent::StreamReset { stream_id, error_code: code }]
    }

    fn peer_max_frame_size(&self) -> usize {
        self.peer_settings.max_frame_size as usize
    }

    fn emit_headers(&mut self, stream_id: u32, headers: &[Header], end_stream: bool) {
        let block = self.hpack_encoder.encode(headers);
        let (head, continuations) = frame::split_header_block(stream_id, &block, self.peer_max_frame_size());
        self.writer.enqueue(frame::serialize(&Frame::Headers {
            stream_id,
            header_block: head,
            end_stream: end_stream && continuations.is_empty(),
            end_headers: continuations.is_empty(),
            priority: None,
            pad_len: 0,
        }));
        for c in continuations {
            self.writer.enqueue(c);
        }
    }

    /// Respond with a small, fully-buffered body (spec §6 `respond_with_string`).
    pub fn respond_with_string(
        &mut self,
        stream_id: u32,
        status: u16,
        mut headers: Vec<Header>,
        body: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let body = body.into();
        headers.insert(0, Header::new(":status", status.to_string()));
        let end_stream = body.is_empty();
        self.emit_headers(stream_id, &headers, end_stream);

        let stream = self.streams.get_mut(&stream_id).ok_or(Error::StreamClosed(stream_id))?;
        stream.apply(Direction::Send, StreamEvent::Headers { end_stream })?;
        if !body.is_empty() {
            stream.pending_body = body;
        }
        self.drain_scheduler();
        Ok(())
    }

    /// Respond with a large, pre-materialized body (spec §6
    /// `respond_with_bigstring`) — functionally identical to
    /// `respond_with_string` at this layer; the distinction upstream is
    /// about avoiding an extra copy for large owned buffers, which Rust's
    /// `Vec<u8>` ownership already gives us for free.
    pub fn respond_with_bigstring(
        &mut self,
        stream_id: u32,
        status: u16,
        headers: Vec<Header>,
        body: Vec<u8>,
    ) -> Result<()> {
        self.respond_with_string(stream_id, status, headers, body)
    }

    /// Begin a streaming response: send headers now, return a handle the
    /// caller can push body chunks into over time via
    /// [`Connection::write_body_chunk`] (spec §6
    /// `respond_with_streaming(flush_headers_immediately?)`).
    pub fn respond_with_streaming(&mut self, stream_id: u32, status: u16, headers: Vec<Header>) -> Result<()> {
        let mut headers = headers;
        headers.insert(0, Header::new(":status", status.to_string()));
        self.emit_headers(stream_id, &headers, false);
        let stream = self.streams.get_mut(&stream_id).ok_or(Error::StreamClosed(stream_id))?;
        stream.apply(Direction::Send, StreamEvent::Headers { end_stream: false })?;
        Ok(())
    }

    /// Append a body chunk to a stream already in a streaming response,
    /// optionally ending it.
    pub fn write_body_chunk(&mut self, stream_id: u32, chunk: &[u8], end_stream: bool) -> Result<()> {
        let stream = self.streams.get_mut(&stream_id).ok_or(Error::StreamClosed(stream_id))?;
        stream.pending_body.extend_from_slice(chunk);
        self.pending_end_stream.insert(stream_id, end_stream);
        self.drain_scheduler();
        Ok(())
    }

    /// Push a resource from `parent_stream_id` (spec §6 `push(request)`).
    /// Returns the promised (even) stream id.
    pub fn push(&mut self, parent_stream_id: u32, method: &str, target: &str, extra_headers: Vec<Header>) -> Result<u32> {
        if self.role != Role::Server {
            return Err(Error::protocol("only a server may push"));
        }
        if !self.config.enable_server_push || !self.peer_settings.enable_push {
            return Err(Error::protocol("peer has disabled server push"));
        }
        self.last_local_stream_id += 2;
        if self.last_local_stream_id == 0 {
            self.last_local_stream_id = 2;
        }
        let promised_id = self.last_local_stream_id;

        let mut headers = vec![Header::new(":method", method), Header::new(":path", target)];
        headers.extend(extra_headers);
        let block = self.hpack_encoder.encode(&headers);
        let (head, continuations) = frame::split_header_block(promised_id, &block, self.peer_max_frame_size());
        self.writer.enqueue(frame::serialize(&Frame::PushPromise {
            stream_id: parent_stream_id,
            promised_stream_id: promised_id,
            header_block: head,
            end_headers: continuations.is_empty(),
            pad_len: 0,
        }));
        for c in continuations {
            self.writer.enqueue(c);
        }

        let mut stream = Stream::new(promised_id, self.local_settings.initial_window_size);
        stream.apply(Direction::Send, StreamEvent::PushPromise)?;
        self.streams.insert(promised_id, stream);
        self.priority.set_priority(promised_id, parent_stream_id, 15, false);
        Ok(promised_id)
    }

    /// Write as much pending DATA as flow control and the priority
    /// scheduler currently allow (spec §4.7: scheduler walks the tree for
    /// the next writable stream; spec §4.8: gated by both windows).
    fn drain_scheduler(&mut self) {
        let max_frame_size = self.peer_max_frame_size();
        loop {
            let conn_window = self.conn_send_window.send_window;
            if conn_window <= 0 {
                break;
            }
            let streams = &self.streams;
            let ready = |id: u32| {
                streams
                    .get(&id)
                    .map(|s| s.has_pending_body() && s.send_window.send_window > 0 && s.state.can_send())
                    .unwrap_or(false)
            };
            let Some(stream_id) = self.priority.next_writable(&ready) else {
                break;
            };
            let stream = self.streams.get_mut(&stream_id).expect("selected by scheduler");
            let n = (stream.pending_body.len() as i64)
                .min(stream.send_window.send_window)
                .min(conn_window)
                .min(max_frame_size as i64) as usize;
            if n == 0 {
                break;
            }
            let chunk: Vec<u8> = stream.pending_body.drain(..n).collect();
            let end_stream = stream.pending_body.is_empty()
                && self.pending_end_stream.get(&stream_id).copied().unwrap_or(true);

            stream.send_window.consume_send(n as u32);
            self.conn_send_window.consume_send(n as u32);
            if end_stream {
                let _ = stream.apply(Direction::Send, StreamEvent::EndStream);
            }
            self.priority.record_write(stream_id, n as u32);

            self.writer.enqueue(frame::serialize(&Frame::Data {
                stream_id,
                data: chunk,
                end_stream,
                pad_len: 0,
            }));
        }
        self.reap_closed_streams();
    }

    /// Drop streams that have reached `Closed` from the active map (spec
    /// §3: "streams... are removed from the active map once `closed`").
    fn reap_closed_streams(&mut self) {
        let closed: Vec<u32> = self
            .streams
            .iter()
            .filter(|(_, s)| s.state.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for id in closed {
            self.streams.remove(&id);
            self.priority.remove(id);
        }
    }

    pub fn next_write_operation(&mut self) -> WriteOperation {
        self.writer.next_write_operation()
    }

    /// Report how many bytes of the last `WriteOperation::Write` batch the
    /// transport actually accepted. A short write (`n` less than the
    /// batch's total length) has its unwritten remainder automatically
    /// requeued at the front of the output queue (spec §4.11); the caller
    /// doesn't need to slice anything itself.
    pub fn report_write_result(&mut self, result: std::result::Result<u64, ()>) -> Result<()> {
        self.writer.report_write_result(result)
    }

    /// Surface an I/O-layer error from the adapter (spec §6 `report_exn`).
    pub fn report_exn(&mut self, e: Error) -> Vec<ConnectionEvent> {
        self.fail_connection(e)
    }
}
