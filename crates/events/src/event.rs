use std::{fmt, sync::Arc};

use {serde::{Deserialize, Serialize}, serde_json::Value};

use crate::{
    actor::Actor,
    error::{Error, Result},
    reply::{ReplyContent, ReplySink},
    scope::Scope,
    segment::Segment,
};

/// The four kinds of inbound occurrence the pipeline routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Message,
    Notice,
    Request,
    Device,
}

impl PostType {
    /// Parse a source-provided post type. Unknown values degrade to
    /// [`PostType::Message`] so a garbled event still flows through the
    /// pipeline instead of stalling it.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "notice" => Self::Notice,
            "request" => Self::Request,
            "device" => Self::Device,
            _ => Self::Message,
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Notice => write!(f, "notice"),
            Self::Request => write!(f, "request"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// Post-type-specific body of a canonical event. Each arm carries only the
/// fields relevant to its kind.
#[derive(Debug, Clone)]
pub enum Payload {
    Message {
        /// Ordered segments as received.
        segments: Vec<Segment>,
        /// Text segments concatenated in order.
        text: String,
        /// Media lists derived from the non-text segments, in order.
        images: Vec<String>,
        audio: Vec<String>,
        videos: Vec<String>,
        files: Vec<String>,
        mentions: Vec<String>,
    },
    Notice {
        notice_type: String,
        sub_type: String,
        data: Value,
    },
    Request {
        request_type: String,
        flag: String,
        comment: Option<String>,
    },
    Device {
        device_event_type: String,
        device_data: Value,
    },
}

impl Payload {
    #[must_use]
    pub fn post_type(&self) -> PostType {
        match self {
            Self::Message { .. } => PostType::Message,
            Self::Notice { .. } => PostType::Notice,
            Self::Request { .. } => PostType::Request,
            Self::Device { .. } => PostType::Device,
        }
    }
}

/// The normalized, source-independent unit of work the dispatch engine
/// routes.
///
/// `event_id` and `adapter_id` are fixed at construction; everything else
/// may be enriched by enhancers before the normal handler walk (the engine
/// hands out `&mut` only during the enhancer pass).
#[derive(Clone)]
pub struct CanonicalEvent {
    event_id: String,
    adapter_id: String,
    /// Bot identity the event arrived on.
    pub self_id: String,
    /// Claim-exclusivity key: the group or user/device this event belongs to.
    pub scope: Scope,
    pub actor: Actor,
    pub payload: Payload,
    /// Arrival time, epoch milliseconds.
    pub received_at_ms: u64,
    reply: Option<Arc<dyn ReplySink>>,
}

impl CanonicalEvent {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        adapter_id: impl Into<String>,
        self_id: impl Into<String>,
        scope: Scope,
        actor: Actor,
        payload: Payload,
        received_at_ms: u64,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            adapter_id: adapter_id.into(),
            self_id: self_id.into(),
            scope,
            actor,
            payload,
            received_at_ms,
            reply: None,
        }
    }

    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    #[must_use]
    pub fn adapter_id(&self) -> &str {
        &self.adapter_id
    }

    #[must_use]
    pub fn post_type(&self) -> PostType {
        self.payload.post_type()
    }

    /// Flattened text, for message events.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Message { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Attach a reply capability. Later attachments win, so an enhancer can
    /// override an adapter-provided sink.
    pub fn set_reply(&mut self, sink: Arc<dyn ReplySink>) {
        self.reply = Some(sink);
    }

    #[must_use]
    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    #[must_use]
    pub fn reply_sink(&self) -> Option<Arc<dyn ReplySink>> {
        self.reply.clone()
    }

    /// Send a reply into this event's scope. Returns delivery success.
    pub async fn reply(&self, content: impl Into<ReplyContent>) -> Result<bool> {
        match &self.reply {
            Some(sink) => sink.send(content.into()).await,
            None => Err(Error::NoReplyCapability),
        }
    }
}

impl fmt::Debug for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalEvent")
            .field("event_id", &self.event_id)
            .field("adapter_id", &self.adapter_id)
            .field("self_id", &self.self_id)
            .field("scope", &self.scope)
            .field("actor", &self.actor)
            .field("payload", &self.payload)
            .field("received_at_ms", &self.received_at_ms)
            .field("reply", &self.reply.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn message_event(text: &str) -> CanonicalEvent {
        CanonicalEvent::new(
            "e1",
            "console",
            "bot",
            Scope::user("1"),
            Actor::new("1"),
            Payload::Message {
                segments: vec![Segment::text(text)],
                text: text.to_string(),
                images: vec![],
                audio: vec![],
                videos: vec![],
                files: vec![],
                mentions: vec![],
            },
            0,
        )
    }

    #[test]
    fn unknown_post_type_degrades_to_message() {
        assert_eq!(PostType::parse("meta_event"), PostType::Message);
        assert_eq!(PostType::parse("NOTICE"), PostType::Notice);
    }

    #[tokio::test]
    async fn reply_without_sink_is_an_error() {
        let event = message_event("hi");
        assert!(matches!(
            event.reply("pong").await,
            Err(Error::NoReplyCapability)
        ));
    }

    #[test]
    fn text_is_none_for_non_message() {
        let event = CanonicalEvent::new(
            "e2",
            "device",
            "bot",
            Scope::user("d1"),
            Actor::new("d1"),
            Payload::Device {
                device_event_type: "motion".into(),
                device_data: serde_json::json!({"zone": 2}),
            },
            0,
        );
        assert_eq!(event.text(), None);
        assert_eq!(event.post_type(), PostType::Device);
    }
}
