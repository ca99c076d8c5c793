//! The orchestrator: dedup, normalize, enhance, claim check, priority walk.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::{debug, trace, warn};

use switchyard_events::{CanonicalEvent, RawEvent, ReplySink, Scope, SourceDefaults, normalize};

#[cfg(feature = "metrics")]
use switchyard_metrics::{counter, dispatch as dispatch_metrics, histogram};

use crate::{
    claims::ContextClaims,
    dedup::{DEFAULT_CAPACITY, Deduplicator, ensure_id},
    handler::Target,
    registry::{HandlerRegistry, Snapshot},
};

/// How a single event's dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Already seen; dropped before normalization.
    Duplicate,
    /// A live claim routed the event straight to its owner.
    Claimed { owner: String },
    /// A normal handler short-circuited the walk.
    Handled { handler: String },
    /// The walk completed with no handler taking the event.
    Unmatched,
}

/// Intake handle adapters push raw events through. Fire-and-forget: the
/// caller is never blocked on handler work.
pub trait EventSink: Send + Sync {
    fn submit(&self, raw: RawEvent);
}

struct EngineSink {
    engine: Arc<DispatchEngine>,
}

impl EventSink for EngineSink {
    fn submit(&self, raw: RawEvent) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.dispatch(raw).await;
        });
    }
}

/// Per-invocation context handed to handlers alongside the event.
///
/// Exposes the claim surface bound to the invoked handler's name, so a
/// handler can only ever create or release claims as itself.
pub struct HandlerCx {
    claims: Arc<ContextClaims>,
    handler_name: String,
    scope: Scope,
    actor_id: String,
    reply: Option<Arc<dyn ReplySink>>,
}

impl HandlerCx {
    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    /// Claim the event's scope for a follow-up turn.
    ///
    /// With `scope_is_group` the claim covers the whole group the event
    /// arrived in (fails for non-group events); otherwise it covers the
    /// individual sender. Returns false on conflict — another handler
    /// already owns the scope.
    pub fn set_context(
        &self,
        scope_is_group: bool,
        ttl: Duration,
        timeout_message: Option<String>,
    ) -> bool {
        let target = if scope_is_group {
            if !self.scope.is_group() {
                warn!(
                    handler = %self.handler_name,
                    scope = %self.scope,
                    "group-scoped claim requested for a non-group event"
                );
                return false;
            }
            self.scope.clone()
        } else {
            Scope::user(self.actor_id.clone())
        };
        self.claims.claim(
            target,
            &self.handler_name,
            ttl,
            timeout_message,
            self.reply.clone(),
        )
    }

    /// Release this handler's claim on the event's scope (group or
    /// sender-level). Idempotent.
    pub fn finish(&self) -> bool {
        let mut released = self
            .claims
            .release_owned(&self.scope, &self.handler_name);
        let user_scope = Scope::user(self.actor_id.clone());
        if user_scope != self.scope {
            released |= self.claims.release_owned(&user_scope, &self.handler_name);
        }
        released
    }
}

/// Routes each deduplicated, normalized event to the right handler.
pub struct DispatchEngine {
    registry: Arc<HandlerRegistry>,
    claims: Arc<ContextClaims>,
    dedup: Mutex<Deduplicator>,
    defaults: HashMap<String, SourceDefaults>,
    fallback: SourceDefaults,
}

impl DispatchEngine {
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>, claims: Arc<ContextClaims>) -> Arc<Self> {
        Self::with_config(registry, claims, DEFAULT_CAPACITY, HashMap::new())
    }

    /// Full constructor: dedup capacity and per-adapter normalization
    /// defaults.
    #[must_use]
    pub fn with_config(
        registry: Arc<HandlerRegistry>,
        claims: Arc<ContextClaims>,
        dedup_capacity: usize,
        defaults: HashMap<String, SourceDefaults>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            claims,
            dedup: Mutex::new(Deduplicator::new(dedup_capacity)),
            defaults,
            fallback: SourceDefaults::default(),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn claims(&self) -> &Arc<ContextClaims> {
        &self.claims
    }

    /// An intake handle that dispatches each submitted event on its own
    /// task, so one slow handler never delays ingestion.
    #[must_use]
    pub fn sink(self: &Arc<Self>) -> Arc<dyn EventSink> {
        Arc::new(EngineSink {
            engine: Arc::clone(self),
        })
    }

    /// Dispatch one raw event to completion.
    pub async fn dispatch(&self, mut raw: RawEvent) -> DispatchOutcome {
        let started = Instant::now();
        let event_id = ensure_id(&mut raw);

        {
            let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
            if !dedup.mark_processed(&raw.adapter_id, &event_id) {
                debug!(event_id = %event_id, adapter = %raw.adapter_id, "duplicate event dropped");
                #[cfg(feature = "metrics")]
                counter!(dispatch_metrics::DUPLICATES).increment(1);
                return DispatchOutcome::Duplicate;
            }
        }
        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::EVENTS, "adapter" => raw.adapter_id.clone()).increment(1);

        let defaults = self.defaults.get(&raw.adapter_id).unwrap_or(&self.fallback);
        let mut event = normalize(raw, defaults);

        let snapshot = self.registry.snapshot();
        self.run_enhancers(&snapshot, &mut event).await;
        // Frozen from here on: handlers only ever see the event immutably.
        let event = event;

        let outcome = match self.claims.owner_of(&event.scope) {
            Some(owner) => match self.dispatch_claimed(&snapshot, owner, &event).await {
                Some(outcome) => outcome,
                // Orphaned claim was released; fall back to the normal walk.
                None => self.walk(&snapshot, &event).await,
            },
            None => self.walk(&snapshot, &event).await,
        };

        debug!(
            event_id = %event.event_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = ?outcome,
            "dispatch complete"
        );
        #[cfg(feature = "metrics")]
        histogram!(dispatch_metrics::WALK_SECONDS).record(started.elapsed().as_secs_f64());
        outcome
    }

    /// Run matching enhancers ascending `(priority, seq)`. Enhancers never
    /// short-circuit and their failures never abort dispatch.
    async fn run_enhancers(&self, snapshot: &Snapshot, event: &mut CanonicalEvent) {
        for entry in snapshot.iter() {
            let descriptor = &entry.descriptor;
            let Target::Enhancer(enhancer) = &descriptor.target else {
                continue;
            };
            if !descriptor.kinds.matches(event.post_type()) {
                continue;
            }
            if let Err(error) = enhancer.enrich(event).await {
                warn!(
                    handler = %descriptor.name,
                    event_id = %event.event_id(),
                    error = %error,
                    "enhancer failed"
                );
            }
        }
    }

    /// Route an event in a claimed scope straight to its owner, bypassing
    /// kind/trigger/role gates — the claim already represents consent.
    /// Returns `None` if the owner has been unregistered (the claim is
    /// released so the scope is not held captive until TTL).
    async fn dispatch_claimed(
        &self,
        snapshot: &Snapshot,
        owner: String,
        event: &CanonicalEvent,
    ) -> Option<DispatchOutcome> {
        let handler = snapshot.iter().find_map(|entry| match &entry.descriptor.target {
            Target::Normal(handler) if entry.descriptor.name == owner => Some(Arc::clone(handler)),
            _ => None,
        });
        let Some(handler) = handler else {
            warn!(scope = %event.scope, owner = %owner, "claim owner no longer registered; releasing claim");
            self.claims.release(&event.scope);
            return None;
        };

        let cx = self.cx_for(&owner, event);
        match handler.handle(event, &cx).await {
            Ok(true) => {
                self.claims.release(&event.scope);
                debug!(scope = %event.scope, owner = %owner, "claimed turn complete; claim released");
            },
            Ok(false) => {
                debug!(scope = %event.scope, owner = %owner, "claimed turn complete; claim kept");
            },
            Err(error) => {
                warn!(
                    handler = %owner,
                    event_id = %event.event_id(),
                    error = %error,
                    "claim owner failed; claim kept"
                );
                #[cfg(feature = "metrics")]
                counter!(dispatch_metrics::HANDLER_FAILURES).increment(1);
            },
        }
        Some(DispatchOutcome::Claimed { owner })
    }

    /// The normal priority walk. One handler's failure never aborts the
    /// walk for the handlers behind it.
    async fn walk(&self, snapshot: &Snapshot, event: &CanonicalEvent) -> DispatchOutcome {
        for entry in snapshot.iter() {
            let descriptor = &entry.descriptor;
            let Target::Normal(handler) = &descriptor.target else {
                continue;
            };
            if !descriptor.kinds.matches(event.post_type()) {
                continue;
            }
            if event.actor.role < descriptor.min_role {
                trace!(handler = %descriptor.name, actor = %event.actor.id, "actor below minimum role");
                continue;
            }
            if !descriptor.trigger.matches(event.text()) {
                continue;
            }

            let cx = self.cx_for(&descriptor.name, event);
            match handler.handle(event, &cx).await {
                Ok(true) => {
                    debug!(handler = %descriptor.name, event_id = %event.event_id(), "event handled");
                    return DispatchOutcome::Handled {
                        handler: descriptor.name.clone(),
                    };
                },
                Ok(false) => {},
                Err(error) => {
                    warn!(
                        handler = %descriptor.name,
                        event_id = %event.event_id(),
                        error = %error,
                        "handler failed; walk continues"
                    );
                    #[cfg(feature = "metrics")]
                    counter!(dispatch_metrics::HANDLER_FAILURES).increment(1);
                },
            }
        }

        trace!(event_id = %event.event_id(), "no handler matched; event dropped");
        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::UNMATCHED).increment(1);
        DispatchOutcome::Unmatched
    }

    fn cx_for(&self, handler_name: &str, event: &CanonicalEvent) -> HandlerCx {
        HandlerCx {
            claims: Arc::clone(&self.claims),
            handler_name: handler_name.to_string(),
            scope: event.scope.clone(),
            actor_id: event.actor.id.clone(),
            reply: event.reply_sink(),
        }
    }
}
