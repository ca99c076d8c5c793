use serde::{Deserialize, Serialize};

/// One piece of a message payload.
///
/// Text segments are concatenated (in order) into the event's flattened
/// text; every other kind lands in the matching media list instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text {
        text: String,
    },
    Image {
        url: String,
    },
    Audio {
        url: String,
    },
    Video {
        url: String,
    },
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// An @-mention of another participant.
    Mention {
        target: String,
    },
}

impl Segment {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    #[must_use]
    pub fn mention(target: impl Into<String>) -> Self {
        Self::Mention {
            target: target.into(),
        }
    }

    /// The text content, if this is a text segment.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}
