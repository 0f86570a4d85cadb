//! Reader/Writer buffering (spec §4.11): the only place the engine touches
//! anything byte-buffer-shaped. Everything above this layer works with
//! parsed `Frame`s; everything below it is the caller's socket.

use crate::error::{Error, Result};

/// What the caller should do next on the read side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOperation {
    /// Read more bytes into the buffer at the given offset, up to the given
    /// length.
    Read,
    /// No further reads are useful right now (e.g. waiting on the
    /// application to drain a body buffer); resume when prompted.
    Yield,
    /// The connection is finished reading.
    Close,
}

/// A growable contiguous receive buffer (spec §4.11). The parser consumes
/// bytes from the front as complete frames become available; partial
/// frames stay buffered until more bytes arrive.
#[derive(Debug, Default)]
pub struct Reader {
    buf: Vec<u8>,
    eof: bool,
}

impl Reader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `len` bytes from `buf` starting at `off`. Mirrors the
    /// `read(buf, off, len)` contract of spec §4.11/§6.
    pub fn fill(&mut self, buf: &[u8], off: usize, len: usize) -> Result<usize> {
        let end = off
            .checked_add(len)
            .ok_or_else(|| Error::Internal("read offset/length overflow".into()))?;
        if end > buf.len() {
            return Err(Error::Internal("read window exceeds buffer length".into()));
        }
        self.buf.extend_from_slice(&buf[off..end]);
        Ok(len)
    }

    pub fn mark_eof(&mut self) {
        self.eof = true;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop `n` consumed bytes from the front of the buffer.
    pub fn consume(&mut self, n: usize) {
        self.buf.drain(..n.min(self.buf.len()));
    }

    /// At EOF, any bytes still buffered are a truncated frame (spec §4.11:
    /// "any trailing incomplete frame ⇒ ProtocolError").
    pub fn check_eof_clean(&self) -> Result<()> {
        if self.eof && !self.buf.is_empty() {
            return Err(Error::protocol("connection closed mid-frame"));
        }
        Ok(())
    }
}

/// What the caller should do next on the write side (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOperation {
    /// Write these owned byte slices, in order.
    Write(Vec<Vec<u8>>),
    /// Nothing queued right now.
    Yield,
    /// Shutdown requested and every queued write has drained; carries the
    /// total bytes written over the connection's lifetime.
    Close(u64),
}

/// A queue of owned byte slices scheduled for output (spec §4.11). The
/// scheduler (priority tree) decides what goes into the queue; this type
/// only tracks what's already been handed to the caller and what remains.
#[derive(Debug, Default)]
pub struct Writer {
    queue: Vec<Vec<u8>>,
    /// The batch most recently handed out by `next_write_operation`, kept
    /// around so a short write can be resolved into an exact remainder
    /// without the caller having to slice it up itself.
    in_flight: Vec<Vec<u8>>,
    total_written: u64,
    close_requested: bool,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.queue.push(bytes);
        }
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Compute what the caller should do next. Takes (and clears) the
    /// current queue; the caller is expected to call
    /// [`Writer::report_write_result`] once it knows how many bytes of the
    /// returned operation were actually flushed.
    pub fn next_write_operation(&mut self) -> WriteOperation {
        if !self.queue.is_empty() {
            let batches = std::mem::take(&mut self.queue);
            self.in_flight = batches.clone();
            return WriteOperation::Write(batches);
        }
        if self.close_requested {
            return WriteOperation::Close(self.total_written);
        }
        WriteOperation::Yield
    }

    /// Report how many bytes of the most recently returned `Write` batch
    /// were actually flushed to the transport. `Ok(n)` credits `n` bytes
    /// and, if `n` is less than the batch's total length, automatically
    /// [`Writer::requeue`]s the unwritten remainder at the front of the
    /// queue (spec §4.11: "remaining bytes stay queued on a partial
    /// write") — the caller only needs to report how many bytes its
    /// transport actually accepted.
    pub fn report_write_result(&mut self, written: Result<u64, ()>) -> Result<()> {
        match written {
            Ok(n) => {
                self.total_written += n;
                let in_flight = std::mem::take(&mut self.in_flight);
                let flat: Vec<u8> = in_flight.into_iter().flatten().collect();
                let n = (n as usize).min(flat.len());
                if n < flat.len() {
                    self.requeue(flat[n..].to_vec());
                }
                Ok(())
            }
            Err(()) => Err(Error::Internal("peer closed the write side".into())),
        }
    }

    /// Put bytes back at the front of the queue (a short write).
    pub fn requeue(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.queue.insert(0, bytes);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.close_requested
    }
}
