//! HPACK (RFC 7541): header compression shared by the frame codec and the
//! connection state machine. Three pieces, grounded on spec §4.2-§4.4:
//! a bounded dynamic table, an encoder that picks a representation and a
//! decoder that classifies one.

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod static_table;

pub use decoder::HpackDecoder;
pub use dynamic_table::DynamicTable;
pub use encoder::HpackEncoder;

/// A single decoded or to-be-encoded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
    /// Set for fields that must never be re-emitted from the dynamic
    /// table or compressed alongside other header fields — either marked
    /// sensitive by the caller, or falling under the policy in
    /// [`is_sensitive_by_policy`].
    pub sensitive: bool,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    pub fn sensitive(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sensitive: true,
        }
    }
}

/// Headers that are sensitive by policy regardless of the caller's own
/// `sensitive` flag (spec §4.3 step 2): `authorization` always, `cookie`
/// when its value is short (< 20 bytes — likely a session token rather
/// than a long accumulated cookie jar).
pub fn is_sensitive_by_policy(name: &str, value: &str) -> bool {
    name.eq_ignore_ascii_case("authorization")
        || (name.eq_ignore_ascii_case("cookie") && value.len() < 20)
}

/// Headers whose value must never be placed in the dynamic table, even
/// when not sensitive (spec §4.3 step 4) — typically because the value is
/// expected to vary on every request/response and indexing it would only
/// bloat the table.
pub fn is_never_index_value(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        ":path"
            | "age"
            | "content-length"
            | "etag"
            | "if-modified-since"
            | "if-none-match"
            | "location"
            | "set-cookie"
    )
}
