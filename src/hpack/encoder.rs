//! HPACK encoder (RFC 7541 §6, spec §4.3): for each header, pick the
//! cheapest legal representation and emit it, maintaining a dynamic table
//! shared with the peer's decoder plus a reverse lookup kept in sync via
//! the table's eviction hook.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use super::dynamic_table::DynamicTable;
use super::static_table;
use super::{is_never_index_value, is_sensitive_by_policy, Header};
use crate::huffman;

#[derive(Default)]
struct ReverseIndex {
    full: HashMap<(String, String), u64>,
    by_name: HashMap<String, BTreeSet<u64>>,
}

pub struct HpackEncoder {
    table: DynamicTable,
    reverse: Rc<RefCell<ReverseIndex>>,
    /// Set by [`HpackEncoder::set_peer_header_table_size`]; emitted as a
    /// dynamic-table-size-update representation ahead of the next header
    /// block, per spec §4.3's "must precede the first header block
    /// affected".
    pending_capacity_update: Option<usize>,
}

impl HpackEncoder {
    pub fn new(capacity: usize) -> Self {
        let reverse = Rc::new(RefCell::new(ReverseIndex::default()));
        let mut table = DynamicTable::new(capacity);
        let hook_reverse = reverse.clone();
        table.set_evict_hook(Box::new(move |entry| {
            let mut r = hook_reverse.borrow_mut();
            r.full.remove(&(entry.name.clone(), entry.value.clone()));
            if let Some(set) = r.by_name.get_mut(&entry.name) {
                set.remove(&entry.seq);
                if set.is_empty() {
                    r.by_name.remove(&entry.name);
                }
            }
        }));
        Self {
            table,
            reverse,
            pending_capacity_update: None,
        }
    }

    /// The peer changed SETTINGS_HEADER_TABLE_SIZE; queue an in-band size
    /// update for the next header block this encoder emits.
    pub fn set_peer_header_table_size(&mut self, new_size: usize) {
        self.pending_capacity_update = Some(new_size);
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.table
    }

    /// Encode a full header list into one HPACK header block.
    pub fn encode(&mut self, headers: &[Header]) -> Vec<u8> {
        let mut out = Vec::new();

        if let Some(new_capacity) = self.pending_capacity_update.take() {
            out.extend(encode_integer(new_capacity, 5, 0x20));
            self.table.set_capacity(new_capacity);
        }

        for header in headers {
            self.encode_one(&mut out, header);
        }

        out
    }

    fn encode_one(&mut self, out: &mut Vec<u8>, header: &Header) {
        let sensitive = header.sensitive || is_sensitive_by_policy(&header.name, &header.value);

        if sensitive {
            let name_index = self.find_name_index(&header.name);
            emit_literal(out, name_index, &header.name, &header.value, 0x10, 4);
            return;
        }

        if let Some(full_index) = self.find_full_index(&header.name, &header.value) {
            out.extend(encode_integer(full_index, 7, 0x80));
            return;
        }

        if is_never_index_value(&header.name) {
            let name_index = self.find_name_index(&header.name);
            emit_literal(out, name_index, &header.name, &header.value, 0x00, 4);
            return;
        }

        let name_index = self.find_name_index(&header.name);
        emit_literal(out, name_index, &header.name, &header.value, 0x40, 6);

        if let Some(seq) = self.table.add(header.name.clone(), header.value.clone()) {
            let mut r = self.reverse.borrow_mut();
            r.full.insert((header.name.clone(), header.value.clone()), seq);
            r.by_name.entry(header.name.clone()).or_default().insert(seq);
        }
    }

    /// Wire index for a live dynamic-table entry (spec §4.3): the newest
    /// entry (largest `seq`) has the lowest index, offset past the static
    /// table.
    fn wire_index(&self, seq: u64) -> usize {
        static_table::STATIC_TABLE.len() + (self.table.next_seq() - seq) as usize
    }

    fn find_full_index(&self, name: &str, value: &str) -> Option<usize> {
        if let Some(idx) = static_table::find_full(name, value) {
            return Some(idx);
        }
        let r = self.reverse.borrow();
        r.full.get(&(name.to_string(), value.to_string())).map(|&seq| self.wire_index(seq))
    }

    fn find_name_index(&self, name: &str) -> Option<usize> {
        if let Some(idx) = static_table::find_name(name) {
            return Some(idx);
        }
        let r = self.reverse.borrow();
        r.by_name
            .get(name)
            .and_then(|seqs| seqs.iter().next_back())
            .map(|&seq| self.wire_index(seq))
    }
}

fn emit_literal(
    out: &mut Vec<u8>,
    name_index: Option<usize>,
    name: &str,
    value: &str,
    prefix_byte: u8,
    prefix_bits: u8,
) {
    match name_index {
        Some(idx) => out.extend(encode_integer(idx, prefix_bits, prefix_byte)),
        None => {
            out.push(prefix_byte);
            encode_string(out, name);
        }
    }
    encode_string(out, value);
}

fn encode_string(out: &mut Vec<u8>, s: &str) {
    let raw = s.as_bytes();
    let huff_len = huffman::encoded_len(raw);
    if huff_len < raw.len() {
        out.extend(encode_integer(huff_len, 7, 0x80));
        out.extend(huffman::encode(raw));
    } else {
        out.extend(encode_integer(raw.len(), 7, 0x00));
        out.extend_from_slice(raw);
    }
}

/// RFC 7541 §5.1 integer encoding with an N-bit prefix. `prefix_byte`
/// already carries whatever representation-selector bits sit above the
/// prefix (the index/length field itself starts at zero).
pub fn encode_integer(value: usize, prefix_bits: u8, prefix_byte: u8) -> Vec<u8> {
    let mask = (1usize << prefix_bits) - 1;
    let mut out = Vec::new();

    if value < mask {
        out.push(prefix_byte | value as u8);
        return out;
    }

    out.push(prefix_byte | mask as u8);
    let mut remaining = value - mask;
    while remaining >= 128 {
        out.push((remaining & 0x7f) as u8 | 0x80);
        remaining >>= 7;
    }
    out.push(remaining as u8);

    out
}
