//! Source adapters.
//!
//! Each adapter translates one external channel — console input, a local
//! device channel, an already-connected wire protocol — into tagged
//! [`RawEvent`]s and pushes them through the engine's [`EventSink`]. The
//! adapter boundary enforces exactly one hard rule: an event with no
//! resolvable bot identity is dropped here, with a warning, and never
//! reaches normalization.

use {async_trait::async_trait, switchyard_dispatch::EventSink, switchyard_events::RawEvent};

pub mod console;
pub mod device;
pub mod error;
pub mod gate;
pub mod wire;

pub use {
    console::{ConsoleAdapter, ConsoleConfig, ConsoleReply, ConsoleReplyEnhancer},
    device::{DeviceAdapter, DeviceSender, DeviceSignal, device_channel},
    error::{Error, Result},
    gate::forward,
    wire::{WireAdapter, WireFrameSender, map_frame, wire_channel},
};

/// A long-running intake loop for one external channel.
#[async_trait]
pub trait Adapter: Send {
    /// Source tag stamped on every event this adapter forwards.
    fn id(&self) -> &str;

    /// Consume the source until it closes, forwarding events into `sink`.
    async fn run(self: Box<Self>, sink: std::sync::Arc<dyn EventSink>) -> Result<()>;
}

/// Shared shape check used by tests and adapters alike.
pub(crate) fn has_identity(raw: &RawEvent) -> bool {
    raw.self_id.as_deref().is_some_and(|id| !id.is_empty())
}
