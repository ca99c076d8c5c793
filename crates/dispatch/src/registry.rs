//! Handler registry: the heap plus a lazily rebuilt read view.
//!
//! Dispatch walks iterate a shared snapshot (`Arc<[Arc<Registered>]>`) in
//! ascending `(priority, seq)` order. The snapshot is rebuilt from the heap
//! only after a mutation (dirty flag), and an in-flight walk keeps whatever
//! snapshot it started with — hot reload never disturbs it mid-walk.
//!
//! Ordering convention: enhancers conventionally register around priority
//! 100 and normal handlers around 1000–5000, so every enhancer runs before
//! any normal handler regardless of source adapter, and a later enhancer
//! sees an earlier enhancer's writes. This is a documented convention, not
//! a hard constant — priorities are plain integers.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

#[cfg(feature = "metrics")]
use switchyard_metrics::{dispatch as dispatch_metrics, gauge};

use crate::{
    error::{Error, Result},
    handler::HandlerDescriptor,
    heap::{PriorityHeap, Registered},
};

/// Shared, ascending view of the registered handlers.
pub type Snapshot = Arc<[Arc<Registered>]>;

struct Inner {
    heap: PriorityHeap,
    next_seq: u64,
    /// Cached ascending view; `None` means dirty.
    view: Option<Snapshot>,
}

/// Registry of routing targets, keyed by stable handler name.
pub struct HandlerRegistry {
    inner: Mutex<Inner>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: PriorityHeap::new(),
                next_seq: 0,
                view: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new handler. Fails if the name is already taken — use
    /// [`HandlerRegistry::replace`] for hot reload.
    pub fn register(&self, descriptor: HandlerDescriptor) -> Result<()> {
        let mut inner = self.lock();
        if inner.heap.iter().any(|e| e.descriptor.name == descriptor.name) {
            return Err(Error::handler_exists(descriptor.name));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        info!(
            handler = %descriptor.name,
            priority = descriptor.priority,
            enhancer = descriptor.is_enhancer(),
            "handler registered"
        );
        inner.heap.insert(Arc::new(Registered { seq, descriptor }));
        inner.view = None;
        self.update_gauge(&inner);
        Ok(())
    }

    /// Withdraw a handler. Returns false if the name was not registered.
    /// An in-flight dispatch walk holding the old snapshot still completes
    /// its invocation; removal only prevents future dispatch.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.heap.remove_where(|e| e.descriptor.name == name);
        if removed.is_empty() {
            return false;
        }
        inner.view = None;
        self.update_gauge(&inner);
        info!(handler = %name, "handler unregistered");
        true
    }

    /// Atomically swap the descriptor at `name`, preserving its original
    /// registration sequence so equal-priority ordering is stable across
    /// reloads.
    pub fn replace(&self, name: &str, descriptor: HandlerDescriptor) -> Result<()> {
        let mut inner = self.lock();
        let removed = inner.heap.remove_where(|e| e.descriptor.name == name);
        let Some(previous) = removed.into_iter().next() else {
            return Err(Error::handler_not_found(name));
        };
        inner.heap.insert(Arc::new(Registered {
            seq: previous.seq,
            descriptor,
        }));
        inner.view = None;
        debug!(handler = %name, "handler replaced");
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().heap.iter().any(|e| e.descriptor.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    /// The ascending read view, rebuilt from the heap only when dirty.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let mut inner = self.lock();
        if let Some(view) = &inner.view {
            return Arc::clone(view);
        }
        let view: Snapshot = inner.heap.ascending().into();
        inner.view = Some(Arc::clone(&view));
        view
    }

    #[cfg(feature = "metrics")]
    fn update_gauge(&self, inner: &Inner) {
        gauge!(dispatch_metrics::HANDLERS).set(inner.heap.len() as f64);
    }

    #[cfg(not(feature = "metrics"))]
    fn update_gauge(&self, _inner: &Inner) {}
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {async_trait::async_trait, switchyard_events::CanonicalEvent};

    use super::*;
    use crate::{engine::HandlerCx, handler::Handler};

    struct Nop;

    #[async_trait]
    impl Handler for Nop {
        async fn handle(&self, _event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    fn descriptor(name: &str, priority: i32) -> HandlerDescriptor {
        HandlerDescriptor::normal(name, priority, Arc::new(Nop))
    }

    fn snapshot_names(registry: &HandlerRegistry) -> Vec<String> {
        registry
            .snapshot()
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = HandlerRegistry::new();
        registry.register(descriptor("a", 100)).unwrap();
        assert!(matches!(
            registry.register(descriptor("a", 200)),
            Err(Error::HandlerExists { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_cached_until_mutation() {
        let registry = HandlerRegistry::new();
        registry.register(descriptor("a", 100)).unwrap();

        let first = registry.snapshot();
        let second = registry.snapshot();
        assert!(Arc::ptr_eq(&first, &second));

        registry.register(descriptor("b", 200)).unwrap();
        let third = registry.snapshot();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn replace_preserves_tie_break_position() {
        let registry = HandlerRegistry::new();
        registry.register(descriptor("first", 1000)).unwrap();
        registry.register(descriptor("second", 1000)).unwrap();

        // Reload "first" at the same priority; it must stay ahead of
        // "second" even though it re-entered the heap later.
        registry.replace("first", descriptor("first", 1000)).unwrap();
        assert_eq!(snapshot_names(&registry), ["first", "second"]);
    }

    #[test]
    fn replace_of_unknown_name_fails() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.replace("ghost", descriptor("ghost", 1)),
            Err(Error::HandlerNotFound { .. })
        ));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = HandlerRegistry::new();
        registry.register(descriptor("a", 100)).unwrap();
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn old_snapshot_survives_mutation() {
        let registry = HandlerRegistry::new();
        registry.register(descriptor("a", 100)).unwrap();
        let held = registry.snapshot();
        registry.unregister("a");
        // The walk that took `held` still sees the old descriptor.
        assert_eq!(held.len(), 1);
        assert_eq!(registry.snapshot().len(), 0);
    }
}
