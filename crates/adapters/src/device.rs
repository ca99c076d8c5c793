//! Local device channel adapter.
//!
//! In-process producers (sensors, timers, platform integrations) hand
//! [`DeviceSignal`]s to a [`DeviceSender`]; the adapter turns them into
//! device events. No transport is involved.

use std::sync::Arc;

use {async_trait::async_trait, serde_json::Value, tokio::sync::mpsc, tracing::debug};

use {switchyard_dispatch::EventSink, switchyard_events::RawEvent};

use crate::{
    Adapter,
    error::{Error, Result},
    gate::forward,
};

pub const ADAPTER_ID: &str = "device";

/// One signal from a local device.
#[derive(Debug, Clone)]
pub struct DeviceSignal {
    pub device_id: String,
    pub event_type: String,
    pub data: Value,
}

/// Producer half of the device channel.
#[derive(Clone)]
pub struct DeviceSender {
    tx: mpsc::Sender<DeviceSignal>,
}

impl DeviceSender {
    pub async fn send(&self, signal: DeviceSignal) -> Result<()> {
        self.tx
            .send(signal)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Consumer half: forwards each signal as a device event.
pub struct DeviceAdapter {
    self_id: String,
    rx: mpsc::Receiver<DeviceSignal>,
}

/// Create the device channel pair.
#[must_use]
pub fn device_channel(self_id: impl Into<String>, capacity: usize) -> (DeviceSender, DeviceAdapter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DeviceSender { tx }, DeviceAdapter {
        self_id: self_id.into(),
        rx,
    })
}

impl DeviceAdapter {
    fn signal_event(&self, signal: DeviceSignal) -> RawEvent {
        let mut raw = RawEvent::new(ADAPTER_ID);
        raw.self_id = Some(self.self_id.clone());
        raw.post_type = Some("device".to_string());
        raw.device_id = Some(signal.device_id);
        raw.device_event_type = Some(signal.event_type);
        raw.data = Some(signal.data);
        raw
    }
}

#[async_trait]
impl Adapter for DeviceAdapter {
    fn id(&self) -> &str {
        ADAPTER_ID
    }

    async fn run(mut self: Box<Self>, sink: Arc<dyn EventSink>) -> Result<()> {
        while let Some(signal) = self.rx.recv().await {
            forward(sink.as_ref(), self.signal_event(signal));
        }
        debug!("device channel closed");
        Ok(())
    }
}
