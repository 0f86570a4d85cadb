//! Connection configuration (spec §6 "Configuration").

use crate::error::{Error, Result};

/// Tunables for a [`crate::connection::Connection`], validated at
/// construction time. Defaults match spec §6's enumerated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub read_buffer_size: usize,
    pub request_body_buffer_size: usize,
    pub response_buffer_size: usize,
    pub response_body_buffer_size: usize,
    pub enable_server_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_buffer_size: 16384,
            request_body_buffer_size: 4096,
            response_buffer_size: 1024,
            response_body_buffer_size: 4096,
            enable_server_push: true,
            max_concurrent_streams: u32::MAX >> 1,
            initial_window_size: 65535,
        }
    }
}

impl Config {
    pub fn with_read_buffer_size(mut self, n: usize) -> Self {
        self.read_buffer_size = n;
        self
    }

    pub fn with_request_body_buffer_size(mut self, n: usize) -> Self {
        self.request_body_buffer_size = n;
        self
    }

    pub fn with_response_buffer_size(mut self, n: usize) -> Self {
        self.response_buffer_size = n;
        self
    }

    pub fn with_response_body_buffer_size(mut self, n: usize) -> Self {
        self.response_body_buffer_size = n;
        self
    }

    pub fn with_enable_server_push(mut self, enabled: bool) -> Self {
        self.enable_server_push = enabled;
        self
    }

    pub fn with_max_concurrent_streams(mut self, n: u32) -> Self {
        self.max_concurrent_streams = n;
        self
    }

    pub fn with_initial_window_size(mut self, n: u32) -> Self {
        self.initial_window_size = n;
        self
    }

    /// Reject combinations that would violate an RFC 7540 invariant before
    /// a `Connection` is ever built from this config.
    pub fn validate(&self) -> Result<()> {
        if self.initial_window_size as i64 > i32::MAX as i64 {
            return Err(Error::protocol(
                "initial_window_size must fit in a signed 31-bit window",
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::protocol("read_buffer_size must be non-zero"));
        }
        Ok(())
    }
}
