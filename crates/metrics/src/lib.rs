//! Metrics facade for switchyard.
//!
//! Thin layer over the `metrics` crate: metric-name definitions plus the
//! re-exported facade macros. Crates record through this facade behind an
//! optional `metrics` feature; with no recorder installed every call is a
//! no-op, so the core never pays for observability it isn't asked for.
//!
//! ```rust,ignore
//! use switchyard_metrics::{counter, dispatch};
//!
//! counter!(dispatch::EVENTS, "adapter" => "console").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export the facade macros so consumers need no direct `metrics` dep.
pub use metrics::{counter, gauge, histogram};
