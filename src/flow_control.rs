//! Flow-control windows (RFC 7540 §6.9, spec §4.8).
//!
//! Both the connection and every stream hold a signed 31-bit send window
//! and recv window. `send_window` can go negative (a SETTINGS-driven
//! `INITIAL_WINDOW_SIZE` decrease applies retroactively, spec §4.8), but
//! must never be pushed positive past `2^31 - 1`.

use crate::error::{Error, Result};

pub const MAX_WINDOW_SIZE: i64 = (1i64 << 31) - 1;

#[derive(Debug, Clone, Copy)]
pub struct FlowWindow {
    pub send_window: i64,
    pub recv_window: i64,
}

impl FlowWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            send_window: initial as i64,
            recv_window: initial as i64,
        }
    }

    /// Account for `n` octets of DATA about to be sent on this window.
    /// Caller must have already checked `n <= send_window`.
    pub fn consume_send(&mut self, n: u32) {
        self.send_window -= n as i64;
    }

    /// Account for `n` octets of DATA just received on this window.
    pub fn consume_recv(&mut self, n: u32) {
        self.recv_window -= n as i64;
    }

    /// Apply a WINDOW_UPDATE increment to the send window (spec §4.8):
    /// `inc` must be 1..=2^31-1 and must not push the window past
    /// `2^31 - 1`.
    pub fn apply_window_update(&mut self, inc: u32) -> Result<()> {
        if inc == 0 {
            return Err(Error::protocol("WINDOW_UPDATE increment must be non-zero"));
        }
        let next = self.send_window + inc as i64;
        if next > MAX_WINDOW_SIZE {
            return Err(Error::flow_control(
                "WINDOW_UPDATE would overflow the flow-control window",
            ));
        }
        self.send_window = next;
        Ok(())
    }

    /// Apply a retroactive SETTINGS_INITIAL_WINDOW_SIZE change (spec
    /// §4.8): shift the send window by the signed delta between the new
    /// and old advertised initial size. Connection-level windows are
    /// never adjusted this way (only stream windows are).
    pub fn apply_initial_window_delta(&mut self, delta: i64) -> Result<()> {
        let next = self.send_window + delta;
        if next > MAX_WINDOW_SIZE {
            return Err(Error::flow_control(
                "SETTINGS_INITIAL_WINDOW_SIZE change would overflow a stream's send window",
            ));
        }
        self.send_window = next;
        Ok(())
    }

    /// Bytes released from a body buffer by the application; returns the
    /// WINDOW_UPDATE increment to send, if the release policy's threshold
    /// is met (spec §4.8: "emit when released bytes >= max(threshold,
    /// current_window/2)").
    pub fn on_bytes_released(&mut self, released: u32, threshold: u32) -> Option<u32> {
        let floor = threshold.max((self.recv_window.max(0) / 2) as u32);
        if released >= floor && released > 0 {
            self.recv_window += released as i64;
            Some(released)
        } else {
            None
        }
    }
}
