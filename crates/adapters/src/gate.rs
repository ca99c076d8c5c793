//! The adapter-boundary identity gate.

use {switchyard_dispatch::EventSink, switchyard_events::RawEvent, tracing::warn};

#[cfg(feature = "metrics")]
use switchyard_metrics::{adapters as adapter_metrics, counter};

use crate::has_identity;

/// Forward a raw event into the pipeline, unless it has no resolvable bot
/// identity — those are dropped here with a warning and never reach
/// normalization. Returns whether the event was forwarded.
pub fn forward(sink: &dyn EventSink, raw: RawEvent) -> bool {
    if !has_identity(&raw) {
        warn!(
            adapter = %raw.adapter_id,
            event_id = raw.event_id.as_deref().unwrap_or(""),
            "event without bot identity dropped at adapter boundary"
        );
        #[cfg(feature = "metrics")]
        counter!(adapter_metrics::IDENTITY_DROPS).increment(1);
        return false;
    }
    #[cfg(feature = "metrics")]
    counter!(adapter_metrics::FORWARDED, "adapter" => raw.adapter_id.clone()).increment(1);
    sink.submit(raw);
    true
}
