//! At-most-once event acceptance.
//!
//! Keyed by `adapter:event_id` so ids only need to be unique per source.
//! The seen-set is insertion-ordered and bounded: overflow is trimmed from
//! the oldest end in one batch pass per insert rather than per-entry, which
//! keeps the amortized cost flat when a capacity change or burst pushes the
//! set far past its cap.

use std::collections::{HashSet, VecDeque};

use {rand::Rng, switchyard_common::now_ms, tracing::debug};

use switchyard_events::RawEvent;

/// Default bound on remembered event ids, per deduplicator.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Synthesize an event id when the source sent none.
///
/// Format: `<adapter>_<post_type>_<timestamp_ms>_<random>`. Returns the id
/// the event ends up with either way; never fails — an absent id is not an
/// error.
pub fn ensure_id(raw: &mut RawEvent) -> String {
    if let Some(id) = raw.event_id.as_deref()
        && !id.is_empty()
    {
        return id.to_string();
    }
    let suffix: u32 = rand::rng().random_range(0..10_000);
    let id = format!("{}_{}_{}_{suffix:04}", raw.adapter_id, raw.kind(), now_ms());
    debug!(event_id = %id, adapter = %raw.adapter_id, "synthesized event id");
    raw.event_id = Some(id.clone());
    id
}

/// Bounded, insertion-ordered record of accepted event ids.
pub struct Deduplicator {
    cap: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl Deduplicator {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a sighting. Returns true on first sight (proceed), false on a
    /// duplicate (drop silently).
    pub fn mark_processed(&mut self, adapter_id: &str, event_id: &str) -> bool {
        let key = format!("{adapter_id}:{event_id}");
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        self.trim_overflow();
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop the oldest `(len - cap)` entries in one pass.
    fn trim_overflow(&mut self) {
        let overflow = self.order.len().saturating_sub(self.cap);
        for _ in 0..overflow {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
