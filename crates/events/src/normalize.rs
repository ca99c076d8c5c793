//! Raw-to-canonical event normalization.
//!
//! Pure and fail-soft: every missing field has a default, so a malformed
//! raw event still produces a best-effort canonical event and the pipeline
//! never stalls on garbage input.

use serde_json::Value;

use {switchyard_common::now_ms, tracing::trace};

use crate::{
    actor::{Actor, Role},
    event::{CanonicalEvent, Payload, PostType},
    raw::{RawEvent, RawMessage},
    scope::Scope,
    segment::Segment,
};

/// Per-source fallbacks applied when the raw event omits a field.
#[derive(Debug, Clone, Default)]
pub struct SourceDefaults {
    /// Bot identity assumed for events that carry none.
    pub self_id: Option<String>,
    /// Actor id granted [`Role::Owner`] regardless of source role.
    pub owner_id: Option<String>,
}

/// Threshold separating epoch-seconds from epoch-millis timestamps.
const MS_EPOCH_FLOOR: u64 = 1_000_000_000_000;

fn time_to_ms(time: u64) -> u64 {
    if time < MS_EPOCH_FLOOR {
        time * 1000
    } else {
        time
    }
}

/// Reduce a raw event to the canonical shape.
///
/// Rules:
/// - scope is `group:<group_id>` when a group id is present, else
///   `user:<user_id|device_id>`;
/// - flattened text concatenates text segments in order, media segments
///   populate the parallel lists;
/// - the sender display name falls back to the actor id;
/// - per-kind required fields default to `"unknown"`/empty rather than
///   failing.
#[must_use]
pub fn normalize(raw: RawEvent, defaults: &SourceDefaults) -> CanonicalEvent {
    let kind = raw.kind();

    let actor_id = raw
        .user_id
        .clone()
        .or_else(|| raw.sender.as_ref().and_then(|s| s.user_id.clone()))
        .or_else(|| raw.device_id.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let mut actor = Actor::new(actor_id);
    if let Some(sender) = &raw.sender {
        if let Some(nickname) = sender.nickname.as_deref()
            && !nickname.is_empty()
        {
            actor.display_name = nickname.to_string();
        }
        if let Some(role) = sender.role.as_deref() {
            actor.role = Role::parse(role);
        }
    }
    if defaults.owner_id.as_deref() == Some(actor.id.as_str()) {
        actor.role = Role::Owner;
    }

    let scope = match raw.group_id.as_deref() {
        Some(group_id) if !group_id.is_empty() => Scope::group(group_id),
        _ => Scope::user(actor.id.clone()),
    };

    let self_id = raw
        .self_id
        .clone()
        .or_else(|| defaults.self_id.clone())
        .unwrap_or_default();

    let received_at_ms = raw.time.map_or_else(now_ms, time_to_ms);

    let payload = match kind {
        PostType::Message => message_payload(raw.message),
        PostType::Notice => Payload::Notice {
            notice_type: raw.notice_type.unwrap_or_else(|| "unknown".to_string()),
            sub_type: raw.sub_type.unwrap_or_else(|| "unknown".to_string()),
            data: raw.data.unwrap_or(Value::Null),
        },
        PostType::Request => Payload::Request {
            request_type: raw.request_type.unwrap_or_else(|| "unknown".to_string()),
            flag: raw.flag.unwrap_or_default(),
            comment: raw.comment,
        },
        PostType::Device => Payload::Device {
            device_event_type: raw
                .device_event_type
                .unwrap_or_else(|| "unknown".to_string()),
            device_data: raw.data.unwrap_or(Value::Null),
        },
    };

    let event_id = raw.event_id.unwrap_or_default();
    trace!(event_id = %event_id, adapter = %raw.adapter_id, kind = %kind, scope = %scope, "normalized event");

    CanonicalEvent::new(
        event_id,
        raw.adapter_id,
        self_id,
        scope,
        actor,
        payload,
        received_at_ms,
    )
}

fn message_payload(message: Option<RawMessage>) -> Payload {
    let segments = match message {
        Some(RawMessage::Text(text)) => vec![Segment::text(text)],
        Some(RawMessage::Segments(segments)) => segments,
        None => Vec::new(),
    };

    let mut text = String::new();
    let mut images = Vec::new();
    let mut audio = Vec::new();
    let mut videos = Vec::new();
    let mut files = Vec::new();
    let mut mentions = Vec::new();

    for segment in &segments {
        match segment {
            Segment::Text { text: t } => text.push_str(t),
            Segment::Image { url } => images.push(url.clone()),
            Segment::Audio { url } => audio.push(url.clone()),
            Segment::Video { url } => videos.push(url.clone()),
            Segment::File { url, .. } => files.push(url.clone()),
            Segment::Mention { target } => mentions.push(target.clone()),
        }
    }

    Payload::Message {
        segments,
        text,
        images,
        audio,
        videos,
        files,
        mentions,
    }
}
