use {async_trait::async_trait, serde::Serialize};

use crate::{error::Result, segment::Segment};

/// Content handed to a reply capability: plain text or structured segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyContent {
    Text(String),
    Segments(Vec<Segment>),
}

impl ReplyContent {
    /// Flatten to plain text. Non-text segments are dropped.
    #[must_use]
    pub fn flat_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Segments(segments) => segments
                .iter()
                .filter_map(Segment::as_text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<&str> for ReplyContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ReplyContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Segment>> for ReplyContent {
    fn from(segments: Vec<Segment>) -> Self {
        Self::Segments(segments)
    }
}

/// Capability to send a reply back into the scope an event came from.
///
/// Attached to the event by its source adapter or an enhancer; consumed by
/// handlers. Returns delivery success.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, content: ReplyContent) -> Result<bool>;
}
