//! Per-stream lifecycle and state (RFC 7540 §5.1, spec §4.9).

use crate::error::{Error, Result};
use crate::flow_control::FlowWindow;
use crate::hpack::Header;

/// A stream's position in the RFC 7540 §5.1 lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// The two directions an endpoint can drive a state transition from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

/// What happened on the wire that might move a stream forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Headers { end_stream: bool },
    PushPromise,
    Data { end_stream: bool },
    EndStream,
    RstStream,
}

impl StreamState {
    /// Apply one state-machine event (spec §4.9). Returns the next state, or
    /// an error if the transition is illegal. `ProtocolError` for anything
    /// RFC 7540 treats as connection-fatal; callers on an already-`Closed`
    /// stream should prefer `Error::StreamClosed` so a late frame can be
    /// handled as a stream error instead (RFC 7540 §5.1 allows a short grace
    /// window after RST_STREAM/closure, which this type doesn't itself
    /// model — the connection state machine tracks that separately).
    pub fn apply(self, dir: Direction, event: Event) -> Result<Self> {
        use Direction::*;
        use Event::*;
        use StreamState::*;

        match (self, dir, event) {
            (Closed, _, _) => Err(Error::StreamClosed(0)),

            (Idle, _, Data { .. }) => Err(Error::protocol("DATA frame on an idle stream")),
            (Idle, _, RstStream) => Err(Error::protocol("RST_STREAM on an idle stream")),

            (Idle, _, Headers { end_stream: false }) => Ok(Open),
            (Idle, Send, Headers { end_stream: true }) => Ok(HalfClosedLocal),
            (Idle, Recv, Headers { end_stream: true }) => Ok(HalfClosedRemote),
            (Idle, Send, PushPromise) => Ok(ReservedLocal),
            (Idle, Recv, PushPromise) => Ok(ReservedRemote),

            (ReservedLocal, Send, Headers { .. }) => Ok(HalfClosedRemote),
            (ReservedRemote, Recv, Headers { .. }) => Ok(HalfClosedLocal),
            (ReservedLocal, _, RstStream) => Ok(Closed),
            (ReservedRemote, _, RstStream) => Ok(Closed),

            (Open, Send, Data { end_stream: true } | EndStream | Headers { end_stream: true }) => {
                Ok(HalfClosedLocal)
            }
            (Open, Recv, Data { end_stream: true } | EndStream | Headers { end_stream: true }) => {
                Ok(HalfClosedRemote)
            }
            (Open, _, Data { end_stream: false }) => Ok(Open),
            (Open, _, RstStream) => Ok(Closed),

            (HalfClosedLocal, Recv, Data { end_stream: true } | EndStream | Headers { end_stream: true }) => {
                Ok(Closed)
            }
            (HalfClosedLocal, Recv, Data { end_stream: false }) => Ok(HalfClosedLocal),
            (HalfClosedLocal, _, RstStream) => Ok(Closed),
            (HalfClosedLocal, Send, _) => Err(Error::protocol(
                "cannot send further frames on a half-closed-local stream",
            )),

            (HalfClosedRemote, Send, Data { end_stream: true } | EndStream | Headers { end_stream: true }) => {
                Ok(Closed)
            }
            (HalfClosedRemote, Send, Data { end_stream: false } | Headers { end_stream: false }) => {
                Ok(HalfClosedRemote)
            }
            (HalfClosedRemote, _, RstStream) => Ok(Closed),
            (HalfClosedRemote, Recv, Data { .. } | Headers { .. }) => Err(Error::StreamClosed(0)),

            _ => Err(Error::protocol("illegal stream state transition")),
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, StreamState::Closed)
    }

    /// Whether the local endpoint may still send on this stream.
    pub fn can_send(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedRemote | StreamState::ReservedLocal)
    }

    /// Whether the remote endpoint may still send on this stream.
    pub fn can_recv(self) -> bool {
        matches!(self, StreamState::Open | StreamState::HalfClosedLocal | StreamState::ReservedRemote)
    }
}

/// Pending request/response metadata for one stream (spec §3 "Stream").
#[derive(Debug, Default, Clone)]
pub struct StreamDescriptor {
    pub headers: Vec<Header>,
    pub trailers: Option<Vec<Header>>,
}

/// One stream's full state (spec §3 "Stream").
#[derive(Debug)]
pub struct Stream {
    pub id: u32,
    pub state: StreamState,
    pub send_window: FlowWindow,
    pub recv_window: FlowWindow,
    pub descriptor: StreamDescriptor,
    /// Body bytes queued to be written as DATA, awaiting flow-control
    /// credit and scheduler selection.
    pub pending_body: Vec<u8>,
    pub trailers_sent: bool,
    pub trailers_expected: bool,
    /// Recv-window bytes consumed since the last WINDOW_UPDATE we sent for
    /// this stream (spec §4.8's release-policy accumulator).
    pub recv_unreleased: u32,
}

impl Stream {
    pub fn new(id: u32, initial_window: u32) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            send_window: FlowWindow::new(initial_window),
            recv_window: FlowWindow::new(initial_window),
            descriptor: StreamDescriptor::default(),
            pending_body: Vec::new(),
            trailers_sent: false,
            trailers_expected: false,
            recv_unreleased: 0,
        }
    }

    pub fn apply(&mut self, dir: Direction, event: Event) -> Result<()> {
        self.state = self.state.apply(dir, event).map_err(|e| match e {
            Error::StreamClosed(_) => Error::StreamClosed(self.id),
            other => other,
        })?;
        Ok(())
    }

    pub fn has_pending_body(&self) -> bool {
        !self.pending_body.is_empty()
    }
}

/// Validate stream-id parity and monotonicity (spec §4.10): a peer's stream
/// id must be odd (client-initiated) or even (server-initiated push), and
/// strictly greater than any previously seen id from that same peer.
pub fn validate_peer_stream_id(id: u32, expect_odd: bool, last_seen: u32) -> Result<()> {
    if id == 0 {
        return Err(Error::protocol("stream id 0 is reserved for the connection"));
    }
    if (id % 2 == 1) != expect_odd {
        return Err(Error::protocol("stream id has the wrong parity for its initiator"));
    }
    if id <= last_seen {
        return Err(Error::protocol(
            "stream id is not strictly greater than previously seen ids",
        ));
    }
    Ok(())
}
