//! HPACK dynamic table (RFC 7541 §2.3.2, spec §4.2 / §3).
//!
//! A bounded FIFO of (name, value) entries. Per-entry cost is
//! `32 + len(name) + len(value)` (§3); the invariant `Σ cost ≤ capacity`
//! holds after every mutation. Eviction is oldest-first and calls a
//! registered hook so the encoder can keep its reverse lookup index in
//! sync without the two structures needing to share ownership.

use std::collections::VecDeque;

/// One live dynamic-table entry, tagged with the monotonically increasing
/// sequence number it was inserted under (spec §3: "newest entry has
/// lowest wire index"; the sequence number is what lets the encoder
/// recompute that wire index without rescanning the table).
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub value: String,
    pub seq: u64,
}

impl Entry {
    /// RFC 7541 §4.1 size accounting.
    pub fn size(&self) -> usize {
        entry_size(&self.name, &self.value)
    }
}

pub fn entry_size(name: &str, value: &str) -> usize {
    32 + name.len() + value.len()
}

pub struct DynamicTable {
    /// Front = newest (dynamic index 1), back = oldest (evicted first).
    entries: VecDeque<Entry>,
    size: usize,
    capacity: usize,
    next_seq: u64,
    on_evict: Option<Box<dyn FnMut(&Entry)>>,
}

impl std::fmt::Debug for DynamicTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicTable")
            .field("entries", &self.entries)
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl DynamicTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            capacity,
            next_seq: 0,
            on_evict: None,
        }
    }

    /// Register a callback invoked with each entry just before it is
    /// evicted (by insertion pressure or by [`set_capacity`]).
    pub fn set_evict_hook(&mut self, hook: Box<dyn FnMut(&Entry)>) {
        self.on_evict = Some(hook);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Look up by 1-based dynamic index (1 = most recently added).
    pub fn get(&self, index: usize) -> Option<&Entry> {
        if index == 0 {
            return None;
        }
        self.entries.get(index - 1)
    }

    /// Insert a new entry, evicting from the oldest end until it fits.
    /// Returns the sequence number assigned, or `None` if the entry alone
    /// is larger than the capacity (RFC-allowed: the table ends up empty
    /// and nothing is stored).
    pub fn add(&mut self, name: String, value: String) -> Option<u64> {
        let cost = entry_size(&name, &value);
        self.evict_to_fit(cost);

        if cost > self.capacity {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.size += cost;
        self.entries.push_front(Entry { name, value, seq });
        Some(seq)
    }

    /// Change capacity, evicting oldest entries until the invariant holds.
    pub fn set_capacity(&mut self, new_capacity: usize) {
        self.capacity = new_capacity;
        self.evict_to_fit(0);
    }

    fn evict_to_fit(&mut self, incoming_cost: usize) {
        while self.size + incoming_cost > self.capacity {
            match self.entries.pop_back() {
                Some(evicted) => {
                    self.size -= evicted.size();
                    if let Some(hook) = self.on_evict.as_mut() {
                        hook(&evicted);
                    }
                }
                None => break,
            }
        }
    }
}
