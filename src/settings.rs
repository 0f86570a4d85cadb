//! SETTINGS parameters (spec §3 "Settings", §4.10).
//!
//! Each side tracks its own advertised settings (acknowledged once the
//! peer's SETTINGS ACK arrives) and the peer's settings (effective the
//! moment the peer's SETTINGS frame is parsed — RFC 7540 requires no ACK
//! round-trip before applying them locally).

use crate::frame::settings_id;

pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4096;
pub const DEFAULT_ENABLE_PUSH: u32 = 1;
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = u32::MAX >> 1; // 2^31 - 1
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65535;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16384;
pub const DEFAULT_MAX_HEADER_LIST_SIZE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            enable_push: DEFAULT_ENABLE_PUSH != 0,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_header_list_size: DEFAULT_MAX_HEADER_LIST_SIZE,
        }
    }
}

impl Settings {
    /// Apply one (identifier, value) pair from a received SETTINGS frame.
    /// Unknown identifiers are ignored per RFC 7540 §6.5.2. Returns the
    /// previous `initial_window_size` if that parameter changed, so the
    /// caller can retroactively adjust every open stream's send window
    /// (spec §4.8).
    pub fn apply(&mut self, id: u16, value: u32) -> Option<u32> {
        match id {
            settings_id::HEADER_TABLE_SIZE => {
                self.header_table_size = value;
                None
            }
            settings_id::ENABLE_PUSH => {
                self.enable_push = value != 0;
                None
            }
            settings_id::MAX_CONCURRENT_STREAMS => {
                self.max_concurrent_streams = value;
                None
            }
            settings_id::INITIAL_WINDOW_SIZE => {
                let previous = self.initial_window_size;
                self.initial_window_size = value;
                Some(previous)
            }
            settings_id::MAX_FRAME_SIZE => {
                self.max_frame_size = value;
                None
            }
            settings_id::MAX_HEADER_LIST_SIZE => {
                self.max_header_list_size = value;
                None
            }
            _ => None,
        }
    }

    /// Encode the settings that differ from `Settings::default()` as wire
    /// (id, value) pairs, in a stable order. A connection that hasn't
    /// changed anything sends an empty SETTINGS frame.
    pub fn to_wire_params(&self) -> Vec<(u16, u32)> {
        let defaults = Settings::default();
        let mut params = Vec::new();
        if self.header_table_size != defaults.header_table_size {
            params.push((settings_id::HEADER_TABLE_SIZE, self.header_table_size));
        }
        if self.enable_push != defaults.enable_push {
            params.push((settings_id::ENABLE_PUSH, self.enable_push as u32));
        }
        if self.max_concurrent_streams != defaults.max_concurrent_streams {
            params.push((
                settings_id::MAX_CONCURRENT_STREAMS,
                self.max_concurrent_streams,
            ));
        }
        if self.initial_window_size != defaults.initial_window_size {
            params.push((settings_id::INITIAL_WINDOW_SIZE, self.initial_window_size));
        }
        if self.max_frame_size != defaults.max_frame_size {
            params.push((settings_id::MAX_FRAME_SIZE, self.max_frame_size));
        }
        if self.max_header_list_size != defaults.max_header_list_size {
            params.push((
                settings_id::MAX_HEADER_LIST_SIZE,
                self.max_header_list_size,
            ));
        }
        params
    }
}
