//! The switchyard routing core.
//!
//! Every inbound event flows: dedup → normalize → enhancer pass → claim
//! check → priority walk. The walk order is the central observable
//! contract: ascending `(priority, registration seq)`, enhancers first by
//! convention, first truthy normal handler wins. Handlers are added and
//! withdrawn at runtime (hot reload) against a binary min-heap, so
//! registry churn costs O(log n) instead of a re-sort.

pub mod claims;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod handler;
pub mod heap;
pub mod registry;

pub use {
    claims::{Claim, ContextClaims},
    dedup::{DEFAULT_CAPACITY, Deduplicator, ensure_id},
    engine::{DispatchEngine, DispatchOutcome, EventSink, HandlerCx},
    error::{Error, Result},
    handler::{Enhancer, Handler, HandlerDescriptor, KindFilter, Target, Trigger},
    heap::{PriorityHeap, Registered},
    registry::{HandlerRegistry, Snapshot},
};
