//! Priority tree and DATA scheduler (spec §4.7).
//!
//! Streams form a weighted dependency forest under a virtual root (stream
//! id 0). Per spec §9's open question, this resolves to a virtual-time
//! weighted-fair-queueing discipline rather than a strict recursive
//! tree-walk: each node accrues a virtual finish time that advances by
//! `bytes_written / weight` every time it is scheduled, and at every
//! level of the tree the sibling with the smallest finish time among
//! those with ready data wins. Idle/closed stream priority state is kept
//! for a bounded history (64 entries, spec §9 open question) and pruned
//! FIFO, reparenting any of its children onto its own parent (RFC 7540
//! §5.3.4) so dependency information isn't simply discarded.

use std::collections::{BTreeSet, HashMap, VecDeque};

pub const ROOT: u32 = 0;
pub const DEFAULT_WEIGHT: u16 = 16;
pub const IDLE_HISTORY_CAPACITY: usize = 64;

struct Node {
    parent: u32,
    weight: u16,
    children: BTreeSet<u32>,
    vtime: f64,
}

impl Node {
    fn root() -> Self {
        Self {
            parent: ROOT,
            weight: DEFAULT_WEIGHT,
            children: BTreeSet::new(),
            vtime: 0.0,
        }
    }
}

pub struct PriorityTree {
    nodes: HashMap<u32, Node>,
    /// FIFO of stream ids with tracked priority state, used to prune the
    /// oldest once [`IDLE_HISTORY_CAPACITY`] is exceeded.
    history: VecDeque<u32>,
}

impl Default for PriorityTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityTree {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT, Node::root());
        Self {
            nodes,
            history: VecDeque::new(),
        }
    }

    /// Insert or reprioritize `stream_id` to depend on `parent` with the
    /// given wire weight (0..=255, meaning actual weight 1..=256).
    /// `exclusive` reparents the parent's previous children under the new
    /// node (RFC 7540 §5.3.1).
    pub fn set_priority(&mut self, stream_id: u32, parent: u32, wire_weight: u8, exclusive: bool) {
        let weight = wire_weight as u16 + 1;
        let parent = if parent == stream_id { ROOT } else { parent };
        self.ensure_node(parent);

        // Detach from any previous parent first.
        if let Some(existing) = self.nodes.get(&stream_id) {
            let old_parent = existing.parent;
            if old_parent != parent {
                if let Some(op) = self.nodes.get_mut(&old_parent) {
                    op.children.remove(&stream_id);
                }
            }
        }

        if exclusive {
            let previous_children: Vec<u32> = self
                .nodes
                .get(&parent)
                .map(|p| p.children.iter().copied().filter(|&c| c != stream_id).collect())
                .unwrap_or_default();

            let node = self.nodes.entry(stream_id).or_insert_with(|| Node {
                parent,
                weight,
                children: BTreeSet::new(),
                vtime: 0.0,
            });
            node.parent = parent;
            node.weight = weight;
            for child in &previous_children {
                node.children.insert(*child);
            }

            for child in previous_children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = stream_id;
                }
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.remove(&child);
                }
            }
        } else {
            let node = self.nodes.entry(stream_id).or_insert_with(|| Node {
                parent,
                weight,
                children: BTreeSet::new(),
                vtime: 0.0,
            });
            node.parent = parent;
            node.weight = weight;
        }

        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(stream_id);
        }

        self.touch_history(stream_id);
    }

    fn ensure_node(&mut self, stream_id: u32) {
        self.nodes.entry(stream_id).or_insert_with(|| Node {
            parent: ROOT,
            weight: DEFAULT_WEIGHT,
            children: BTreeSet::new(),
            vtime: 0.0,
        });
        if stream_id != ROOT && !self.history.contains(&stream_id) {
            self.touch_history(stream_id);
        }
    }

    fn touch_history(&mut self, stream_id: u32) {
        if stream_id == ROOT {
            return;
        }
        self.history.retain(|&id| id != stream_id);
        self.history.push_back(stream_id);
        while self.history.len() > IDLE_HISTORY_CAPACITY {
            if let Some(oldest) = self.history.pop_front() {
                self.prune(oldest);
            }
        }
    }

    /// Drop a stream's priority state, reparenting its children onto its
    /// own parent (RFC 7540 §5.3.4).
    fn prune(&mut self, stream_id: u32) {
        let Some(node) = self.nodes.remove(&stream_id) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&node.parent) {
            parent.children.remove(&stream_id);
            for child in &node.children {
                parent.children.insert(*child);
            }
        }
        for child in node.children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.parent = node.parent;
            }
        }
    }

    /// Explicitly remove a stream's priority state (called when a stream
    /// closes and the caller doesn't want it counted toward idle history).
    pub fn remove(&mut self, stream_id: u32) {
        self.history.retain(|&id| id != stream_id);
        self.prune(stream_id);
    }

    /// Select the next stream to write DATA for, given a predicate for
    /// "this stream currently has bytes queued and flow-control credit".
    /// Walks the tree from the root, at each level picking the ready
    /// child (or ready descendant) with the smallest virtual finish time.
    pub fn next_writable(&self, ready: &impl Fn(u32) -> bool) -> Option<u32> {
        self.select_from(ROOT, ready)
    }

    fn select_from(&self, node_id: u32, ready: &impl Fn(u32) -> bool) -> Option<u32> {
        let node = self.nodes.get(&node_id)?;
        let mut candidates: Vec<u32> = node
            .children
            .iter()
            .copied()
            .filter(|&c| ready(c) || self.has_ready_descendant(c, ready))
            .collect();
        candidates.sort_by(|&a, &b| {
            let va = self.nodes[&a].vtime;
            let vb = self.nodes[&b].vtime;
            va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
        });
        for candidate in candidates {
            if ready(candidate) {
                return Some(candidate);
            }
            if let Some(found) = self.select_from(candidate, ready) {
                return Some(found);
            }
        }
        None
    }

    fn has_ready_descendant(&self, node_id: u32, ready: &impl Fn(u32) -> bool) -> bool {
        let Some(node) = self.nodes.get(&node_id) else {
            return false;
        };
        node.children
            .iter()
            .any(|&c| ready(c) || self.has_ready_descendant(c, ready))
    }

    /// Record that `bytes` were just written for `stream_id`, advancing
    /// its virtual finish time by `bytes / weight`.
    pub fn record_write(&mut self, stream_id: u32, bytes: u32) {
        if let Some(node) = self.nodes.get_mut(&stream_id) {
            node.vtime += bytes as f64 / node.weight as f64;
        }
    }

    /// Whether `stream_id` already has explicit priority state (e.g. from
    /// a PRIORITY flag/frame already processed).
    pub fn has_node(&self, stream_id: u32) -> bool {
        self.nodes.contains_key(&stream_id)
    }

    pub fn weight(&self, stream_id: u32) -> u16 {
        self.nodes.get(&stream_id).map(|n| n.weight).unwrap_or(DEFAULT_WEIGHT)
    }
}
