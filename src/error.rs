//! Error taxonomy (spec §7): every fallible operation in the engine reports
//! one of these kinds, each tagged with the RFC 7540 scope it applies at.

use std::fmt;

/// Whether an [`Error`] terminates a single stream or the whole connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// The peer or the engine must tear down the entire connection (GOAWAY).
    Connection,
    /// Only the offending stream is affected (RST_STREAM); the connection
    /// continues normally.
    Stream,
}

/// RFC 7540 §7 error codes, used on the wire in RST_STREAM/GOAWAY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    pub fn from_wire(value: u32) -> Self {
        match value {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The engine's unified error type. Every variant maps to an [`ErrorCode`]
/// and an [`ErrorScope`] via [`Error::code`] / [`Error::scope`], which is
/// what a caller needs to emit the right RST_STREAM/GOAWAY.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("flow control error: {0}")]
    FlowControl(String),

    #[error("SETTINGS ACK not received in time")]
    SettingsTimeout,

    #[error("stream {0} is closed")]
    StreamClosed(u32),

    #[error("frame size error: {0}")]
    FrameSize(String),

    #[error("stream {0} refused: exceeds MAX_CONCURRENT_STREAMS")]
    RefusedStream(u32),

    #[error("stream {0} cancelled")]
    Cancel(u32),

    #[error("HPACK compression error: {0}")]
    Compression(String),

    #[error("CONNECT error: {0}")]
    Connect(String),

    #[error("enhance your calm")]
    EnhanceYourCalm,

    #[error("inadequate security")]
    InadequateSecurity,

    #[error("HTTP/1.1 required")]
    Http11Required,
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn frame_size(msg: impl Into<String>) -> Self {
        Self::FrameSize(msg.into())
    }

    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }

    pub fn flow_control(msg: impl Into<String>) -> Self {
        Self::FlowControl(msg.into())
    }

    /// The RFC 7540 §7 wire error code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Protocol(_) => ErrorCode::ProtocolError,
            Error::Internal(_) => ErrorCode::InternalError,
            Error::FlowControl(_) => ErrorCode::FlowControlError,
            Error::SettingsTimeout => ErrorCode::SettingsTimeout,
            Error::StreamClosed(_) => ErrorCode::StreamClosed,
            Error::FrameSize(_) => ErrorCode::FrameSizeError,
            Error::RefusedStream(_) => ErrorCode::RefusedStream,
            Error::Cancel(_) => ErrorCode::Cancel,
            Error::Compression(_) => ErrorCode::CompressionError,
            Error::Connect(_) => ErrorCode::ConnectError,
            Error::EnhanceYourCalm => ErrorCode::EnhanceYourCalm,
            Error::InadequateSecurity => ErrorCode::InadequateSecurity,
            Error::Http11Required => ErrorCode::Http11Required,
        }
    }

    /// The default scope for this error kind.
    ///
    /// Per spec §7, `FrameSizeError` can be either scope depending on whether
    /// the frame landed on an already-known stream; callers that have that
    /// context (the connection state machine) decide per-occurrence instead
    /// of relying on this default.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Error::StreamClosed(_) | Error::RefusedStream(_) | Error::Cancel(_) => {
                ErrorScope::Stream
            }
            _ => ErrorScope::Connection,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
