//! Binary min-heap over registered handlers.
//!
//! Handlers come and go continuously under hot reload, so the registry needs
//! logarithmic insertion and removal rather than an O(n log n) re-sort per
//! change. The heap orders entries by `(priority, seq)` — priority first,
//! registration sequence as the tie-break — which makes a full drain yield
//! exactly the dispatch walk order.

use std::sync::Arc;

use crate::handler::HandlerDescriptor;

/// A descriptor bound to its registration sequence number.
#[derive(Debug)]
pub struct Registered {
    /// Monotonic registration sequence; ties on priority resolve to the
    /// earlier registration. Preserved across `replace` so a hot reload
    /// never reorders equal-priority peers.
    pub seq: u64,
    pub descriptor: HandlerDescriptor,
}

impl Registered {
    fn key(&self) -> (i32, u64) {
        (self.descriptor.priority, self.seq)
    }
}

/// Vec-backed binary min-heap keyed by `(priority, seq)`.
pub struct PriorityHeap {
    slots: Vec<Arc<Registered>>,
}

impl PriorityHeap {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The earliest entry in walk order. O(1).
    #[must_use]
    pub fn peek(&self) -> Option<&Arc<Registered>> {
        self.slots.first()
    }

    /// Unordered iteration over all entries (heap layout, not walk order).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Registered>> {
        self.slots.iter()
    }

    /// O(log n).
    pub fn insert(&mut self, entry: Arc<Registered>) {
        self.slots.push(entry);
        self.sift_up(self.slots.len() - 1);
    }

    /// Remove and return the earliest entry. O(log n).
    pub fn extract_min(&mut self) -> Option<Arc<Registered>> {
        if self.slots.is_empty() {
            return None;
        }
        let last = self.slots.len() - 1;
        self.slots.swap(0, last);
        let min = self.slots.pop();
        if !self.slots.is_empty() {
            self.sift_down(0);
        }
        min
    }

    /// Remove every entry matching `pred`, returning the removed entries.
    ///
    /// O(n) scan per removal; each hole is filled by swapping in the last
    /// element and repairing the heap at that slot. The replacement's key is
    /// unconstrained relative to its new neighbors, so the repair sifts in
    /// whichever direction the key demands.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<Arc<Registered>>
    where
        F: FnMut(&Registered) -> bool,
    {
        let mut removed = Vec::new();
        loop {
            let Some(idx) = self.slots.iter().position(|e| pred(e)) else {
                break;
            };
            let entry = self.slots.swap_remove(idx);
            if idx < self.slots.len() {
                self.repair(idx);
            }
            removed.push(entry);
        }
        removed
    }

    /// All entries in ascending walk order, without disturbing the heap.
    /// O(n log n); callers cache the result and rebuild only on mutation.
    #[must_use]
    pub fn ascending(&self) -> Vec<Arc<Registered>> {
        let mut scratch = Self {
            slots: self.slots.clone(),
        };
        let mut ordered = Vec::with_capacity(scratch.len());
        while let Some(entry) = scratch.extract_min() {
            ordered.push(entry);
        }
        ordered
    }

    fn repair(&mut self, idx: usize) {
        if idx > 0 && self.slots[idx].key() < self.slots[(idx - 1) / 2].key() {
            self.sift_up(idx);
        } else {
            self.sift_down(idx);
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.slots[idx].key() >= self.slots[parent].key() {
                break;
            }
            self.slots.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.slots[right].key() < self.slots[left].key() {
                smallest = right;
            }
            if self.slots[idx].key() <= self.slots[smallest].key() {
                break;
            }
            self.slots.swap(idx, smallest);
            idx = smallest;
        }
    }
}

impl Default for PriorityHeap {
    fn default() -> Self {
        Self::new()
    }
}
