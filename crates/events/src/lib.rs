//! Canonical event model and normalization.
//!
//! Every inbound occurrence — chat message, platform notice, friend/join
//! request, device signal — enters the pipeline as a tolerant [`RawEvent`]
//! and leaves normalization as a [`CanonicalEvent`]: a shared envelope
//! (id, adapter, scope, actor, arrival time) around a payload variant keyed
//! by post type. Normalization is pure and fails soft; a malformed raw event
//! still yields a best-effort canonical event.

pub mod actor;
pub mod error;
pub mod event;
pub mod normalize;
pub mod raw;
pub mod reply;
pub mod scope;
pub mod segment;

pub use {
    actor::{Actor, Role},
    error::{Error, Result},
    event::{CanonicalEvent, Payload, PostType},
    normalize::{SourceDefaults, normalize},
    raw::{RawEvent, RawMessage, RawSender},
    reply::{ReplyContent, ReplySink},
    scope::Scope,
    segment::Segment,
};
