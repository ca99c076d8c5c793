//! Wire adapter: maps already-delivered protocol frames into intake events.
//!
//! The transport (websocket, HTTP webhook, whatever carries the frames) is
//! someone else's problem — frames arrive here as parsed JSON through a
//! local channel. Field mapping is tolerant: ids may be numbers or strings,
//! message bodies may be plain text, canonical segments, or `type`/`data`
//! segment objects.

use std::sync::Arc;

use {async_trait::async_trait, serde_json::Value, tokio::sync::mpsc, tracing::debug};

use {
    switchyard_dispatch::EventSink,
    switchyard_events::{RawEvent, RawMessage, RawSender, Segment},
};

use crate::{
    Adapter,
    error::{Error, Result},
    gate::forward,
};

pub const ADAPTER_ID: &str = "wire";

/// Producer half: hand parsed frames to the adapter.
#[derive(Clone)]
pub struct WireFrameSender {
    tx: mpsc::Sender<Value>,
}

impl WireFrameSender {
    pub async fn push(&self, frame: Value) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| Error::ChannelClosed)
    }
}

/// Consumer half: maps each frame and forwards it through the gate.
pub struct WireAdapter {
    fallback_self_id: Option<String>,
    rx: mpsc::Receiver<Value>,
}

/// Create the wire channel pair. `fallback_self_id` fills in for frames
/// that carry no bot identity of their own.
#[must_use]
pub fn wire_channel(
    fallback_self_id: Option<String>,
    capacity: usize,
) -> (WireFrameSender, WireAdapter) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (WireFrameSender { tx }, WireAdapter {
        fallback_self_id,
        rx,
    })
}

#[async_trait]
impl Adapter for WireAdapter {
    fn id(&self) -> &str {
        ADAPTER_ID
    }

    async fn run(mut self: Box<Self>, sink: Arc<dyn EventSink>) -> Result<()> {
        while let Some(frame) = self.rx.recv().await {
            forward(
                sink.as_ref(),
                map_frame(&frame, self.fallback_self_id.as_deref()),
            );
        }
        debug!("wire frame channel closed");
        Ok(())
    }
}

fn coerce_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(frame: &Value, key: &str) -> Option<String> {
    frame.get(key).and_then(coerce_str)
}

/// Map one protocol frame into an intake event.
#[must_use]
pub fn map_frame(frame: &Value, fallback_self_id: Option<&str>) -> RawEvent {
    let mut raw = RawEvent::new(ADAPTER_ID);
    raw.event_id = field(frame, "event_id").or_else(|| field(frame, "message_id"));
    raw.post_type = field(frame, "post_type");
    raw.self_id = field(frame, "self_id").or_else(|| fallback_self_id.map(str::to_string));
    raw.user_id = field(frame, "user_id");
    raw.group_id = field(frame, "group_id");
    raw.device_id = field(frame, "device_id");
    raw.time = frame.get("time").and_then(Value::as_u64);
    raw.message = frame.get("message").and_then(map_message);
    raw.sender = frame.get("sender").map(map_sender);
    raw.notice_type = field(frame, "notice_type");
    raw.sub_type = field(frame, "sub_type");
    raw.request_type = field(frame, "request_type");
    raw.flag = field(frame, "flag");
    raw.comment = field(frame, "comment");
    raw.device_event_type =
        field(frame, "device_event_type").or_else(|| field(frame, "event_type"));
    raw.data = frame.get("data").cloned();
    raw
}

fn map_sender(sender: &Value) -> RawSender {
    RawSender {
        user_id: field(sender, "user_id"),
        nickname: field(sender, "nickname").or_else(|| field(sender, "card")),
        role: field(sender, "role"),
    }
}

fn map_message(message: &Value) -> Option<RawMessage> {
    match message {
        Value::String(text) => Some(RawMessage::Text(text.clone())),
        Value::Array(parts) => {
            let segments: Vec<Segment> = parts.iter().filter_map(map_segment).collect();
            Some(RawMessage::Segments(segments))
        },
        _ => None,
    }
}

/// Accept both canonical (`kind`-tagged) and `type`/`data` segment shapes.
fn map_segment(part: &Value) -> Option<Segment> {
    if part.get("kind").is_some() {
        return serde_json::from_value(part.clone()).ok();
    }
    let data = part.get("data").unwrap_or(&Value::Null);
    let url = || {
        field(data, "url")
            .or_else(|| field(data, "file"))
            .unwrap_or_default()
    };
    match part.get("type").and_then(Value::as_str)? {
        "text" => Some(Segment::text(field(data, "text").unwrap_or_default())),
        "image" => Some(Segment::Image { url: url() }),
        "record" | "audio" => Some(Segment::Audio { url: url() }),
        "video" => Some(Segment::Video { url: url() }),
        "file" => Some(Segment::File {
            url: url(),
            name: field(data, "name"),
        }),
        "at" | "mention" => field(data, "qq")
            .or_else(|| field(data, "target"))
            .map(Segment::mention),
        other => {
            debug!(segment_type = %other, "unmapped segment type skipped");
            None
        },
    }
}
