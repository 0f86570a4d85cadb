//! A sans-I/O HTTP/2 protocol engine (RFC 7540, RFC 7541).
//!
//! This crate implements the HTTP/2 connection state machine, HPACK header
//! compression, flow control and the priority-tree DATA scheduler as a pure
//! state machine: no sockets, no async runtime, no threads. Callers own the
//! transport and drive the engine by feeding it bytes and pulling frames
//! back out.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use h2_core::{Connection, ConnectionEvent, Config, Role};
//!
//! let mut conn = Connection::new(Role::Server, Config::default())?;
//!
//! // Feed bytes read from the socket.
//! let mut buf = [0u8; 4096];
//! let n = socket.read(&mut buf)?;
//! let (_, events) = conn.read(&buf, 0, n)?;
//!
//! for event in events {
//!     if let ConnectionEvent::Request { stream_id, end_stream, .. } = event {
//!         if end_stream {
//!             conn.respond_with_string(stream_id, 200, vec![], "hello".into())?;
//!         }
//!     }
//! }
//!
//! // Drain whatever the engine queued back out to the socket.
//! # Ok::<(), h2_core::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`frame`]: wire format for the ten RFC 7540 frame types.
//! - [`hpack`]: header compression (RFC 7541), including the dynamic table.
//! - [`stream`]: per-stream lifecycle state machine (RFC 7540 §5.1).
//! - [`priority`]: the weighted dependency tree DATA frames are scheduled
//!   against (RFC 7540 §5.3).
//! - [`flow_control`]: per-stream and per-connection window accounting
//!   (RFC 7540 §6.9).
//! - [`settings`]: negotiated connection parameters (RFC 7540 §6.5).
//! - [`io`]: the buffering contract between the engine and a caller-owned
//!   transport.
//! - [`config`]: tunables validated at [`Connection`] construction time.
//! - [`connection`]: ties the above together into the actual state machine.
//!
//! It does NOT provide:
//! - TCP/TLS transport (you provide the bytes)
//! - An async runtime integration (you drive `read`/`read_eof` yourself)
//! - A routing/application layer (you get [`ConnectionEvent`]s, not requests
//!   dispatched to handlers)

pub mod config;
pub mod connection;
pub mod error;
pub mod flow_control;
pub mod frame;
pub mod hpack;
pub mod huffman;
pub mod io;
pub mod priority;
pub mod settings;
pub mod stream;

pub use config::Config;
pub use connection::{Connection, ConnectionEvent, Role};
pub use error::{Error, ErrorCode, ErrorScope, Result};
pub use frame::{Frame, FrameHeader, CONNECTION_PREFACE};
pub use hpack::{Header, HpackDecoder, HpackEncoder};
pub use io::{ReadOperation, Reader, WriteOperation, Writer};
pub use stream::{Stream, StreamState};
