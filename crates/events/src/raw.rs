use {serde::{Deserialize, Serialize}, serde_json::Value};

use crate::{event::PostType, segment::Segment};

/// Source-tagged intake shape produced by adapters, before normalization.
///
/// Everything except `adapter_id` is optional: normalization defaults what
/// is missing rather than rejecting the event. Adapters enforce exactly one
/// hard requirement — a resolvable bot identity (`self_id`) — and drop the
/// event at the boundary otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    pub adapter_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Source timestamp, epoch seconds or milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<RawMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<RawSender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_event_type: Option<String>,
    /// Opaque per-kind data blob (notice metadata, device payload, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RawEvent {
    #[must_use]
    pub fn new(adapter_id: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            ..Self::default()
        }
    }

    /// Convenience constructor for a plain text message event.
    #[must_use]
    pub fn message(
        adapter_id: impl Into<String>,
        self_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            self_id: Some(self_id.into()),
            user_id: Some(user_id.into()),
            post_type: Some("message".into()),
            message: Some(RawMessage::Text(text.into())),
            ..Self::new(adapter_id)
        }
    }

    /// Parsed post type, defaulting to message.
    #[must_use]
    pub fn kind(&self) -> PostType {
        self.post_type
            .as_deref()
            .map_or(PostType::Message, PostType::parse)
    }
}

/// A message body as sources deliver it: either a plain string or an
/// already-structured segment list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMessage {
    Text(String),
    Segments(Vec<Segment>),
}

/// Sender details as delivered by the source, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSender {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_body_accepts_string_or_segments() {
        let plain: RawMessage = serde_json::from_value(serde_json::json!("hello")).unwrap();
        assert_eq!(plain, RawMessage::Text("hello".into()));

        let structured: RawMessage = serde_json::from_value(serde_json::json!([
            {"kind": "text", "text": "hi "},
            {"kind": "image", "url": "http://x/i.png"}
        ]))
        .unwrap();
        assert!(matches!(structured, RawMessage::Segments(ref s) if s.len() == 2));
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let raw: RawEvent =
            serde_json::from_value(serde_json::json!({"adapter_id": "wire"})).unwrap();
        assert_eq!(raw.adapter_id, "wire");
        assert!(raw.self_id.is_none());
        assert_eq!(raw.kind(), PostType::Message);
    }
}
