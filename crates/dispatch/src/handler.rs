//! Handler descriptors and the traits routing targets implement.

use std::{fmt, sync::Arc};

use {async_trait::async_trait, regex::Regex};

use switchyard_events::{CanonicalEvent, PostType, Role};

use crate::{engine::HandlerCx, error::Result};

/// A normal routing target.
///
/// Returns `Ok(true)` when the event was handled — the dispatch walk stops —
/// and `Ok(false)` to pass. An error is logged and treated as not-handled;
/// it never aborts dispatch for the handlers behind it.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &CanonicalEvent, cx: &HandlerCx) -> anyhow::Result<bool>;
}

/// An enriching pass that runs before every normal handler and never stops
/// the walk. Enhancers are the only code that sees the event mutably: they
/// bind reply capabilities, backfill sender fields, attach context.
#[async_trait]
pub trait Enhancer: Send + Sync {
    async fn enrich(&self, event: &mut CanonicalEvent) -> anyhow::Result<()>;
}

/// What a descriptor routes to.
#[derive(Clone)]
pub enum Target {
    Normal(Arc<dyn Handler>),
    Enhancer(Arc<dyn Enhancer>),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(_) => write!(f, "Normal"),
            Self::Enhancer(_) => write!(f, "Enhancer"),
        }
    }
}

/// Which post types a handler accepts.
#[derive(Debug, Clone, Default)]
pub enum KindFilter {
    #[default]
    Any,
    Only(Vec<PostType>),
}

impl KindFilter {
    #[must_use]
    pub fn only(kinds: impl IntoIterator<Item = PostType>) -> Self {
        Self::Only(kinds.into_iter().collect())
    }

    #[must_use]
    pub fn matches(&self, kind: PostType) -> bool {
        match self {
            Self::Any => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

/// Predicate over an event's flattened text.
///
/// Non-message events have no text; only [`Trigger::Always`] matches them.
#[derive(Debug, Clone, Default)]
pub enum Trigger {
    #[default]
    Always,
    Pattern(Regex),
    Substring(String),
}

impl Trigger {
    /// Compile a regex trigger.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    #[must_use]
    pub fn substring(needle: impl Into<String>) -> Self {
        Self::Substring(needle.into())
    }

    #[must_use]
    pub fn matches(&self, text: Option<&str>) -> bool {
        match self {
            Self::Always => true,
            Self::Pattern(regex) => text.is_some_and(|t| regex.is_match(t)),
            Self::Substring(needle) => text.is_some_and(|t| t.contains(needle.as_str())),
        }
    }
}

/// A registered routing target: stable name, walk position, gates, and the
/// handler itself.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    /// Stable registry key; hot reload replaces the descriptor at this name.
    pub name: String,
    /// Walk position; lower runs earlier. Registration order breaks ties.
    pub priority: i32,
    pub kinds: KindFilter,
    pub trigger: Trigger,
    /// Minimum actor role; events from less privileged actors are skipped.
    pub min_role: Role,
    pub target: Target,
}

impl HandlerDescriptor {
    #[must_use]
    pub fn normal(name: impl Into<String>, priority: i32, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            priority,
            kinds: KindFilter::Any,
            trigger: Trigger::Always,
            min_role: Role::Member,
            target: Target::Normal(handler),
        }
    }

    #[must_use]
    pub fn enhancer(name: impl Into<String>, priority: i32, enhancer: Arc<dyn Enhancer>) -> Self {
        Self {
            name: name.into(),
            priority,
            kinds: KindFilter::Any,
            trigger: Trigger::Always,
            min_role: Role::Member,
            target: Target::Enhancer(enhancer),
        }
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: KindFilter) -> Self {
        self.kinds = kinds;
        self
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn with_min_role(mut self, min_role: Role) -> Self {
        self.min_role = min_role;
        self
    }

    #[must_use]
    pub fn is_enhancer(&self) -> bool {
        matches!(self.target, Target::Enhancer(_))
    }
}
