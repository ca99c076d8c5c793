//! Canonical metric names, grouped by subsystem.

/// Dispatch engine metrics.
pub mod dispatch {
    /// Counter: events accepted into dispatch, labeled by `adapter`.
    pub const EVENTS: &str = "switchyard_dispatch_events_total";
    /// Counter: duplicate events dropped by the deduplicator.
    pub const DUPLICATES: &str = "switchyard_dispatch_duplicates_total";
    /// Counter: handler invocations that returned an error.
    pub const HANDLER_FAILURES: &str = "switchyard_dispatch_handler_failures_total";
    /// Counter: events that completed the walk with no handler match.
    pub const UNMATCHED: &str = "switchyard_dispatch_unmatched_total";
    /// Gauge: handlers currently registered.
    pub const HANDLERS: &str = "switchyard_dispatch_handlers";
    /// Histogram: seconds spent dispatching one event end to end.
    pub const WALK_SECONDS: &str = "switchyard_dispatch_walk_seconds";
}

/// Context claim metrics.
pub mod claims {
    /// Gauge: live claims.
    pub const ACTIVE: &str = "switchyard_claims_active";
    /// Counter: claims that expired before release.
    pub const TIMEOUTS: &str = "switchyard_claims_timeouts_total";
    /// Counter: claim attempts rejected because the scope was taken.
    pub const CONFLICTS: &str = "switchyard_claims_conflicts_total";
}

/// Source adapter metrics.
pub mod adapters {
    /// Counter: raw events forwarded into the pipeline, labeled by `adapter`.
    pub const FORWARDED: &str = "switchyard_adapter_forwarded_total";
    /// Counter: events dropped at the boundary for a missing bot identity.
    pub const IDENTITY_DROPS: &str = "switchyard_adapter_identity_drops_total";
}
