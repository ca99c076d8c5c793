//! Built-in demo handlers.
//!
//! Just enough routing targets to exercise the whole pipeline from the
//! console — a ping, a status report, and a multi-turn exchange that walks
//! through claim, follow-up, and release.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use {
    switchyard_adapters::ConsoleReplyEnhancer,
    switchyard_dispatch::{
        ContextClaims, Handler, HandlerCx, HandlerDescriptor, HandlerRegistry, KindFilter, Result,
        Trigger,
    },
    switchyard_events::{CanonicalEvent, PostType},
};

// Registry convention: enhancers around 100, normal handlers 1000–5000.
const ENHANCER_PRIORITY: i32 = 100;
const PING_PRIORITY: i32 = 1000;
const GREETER_PRIORITY: i32 = 4000;
const STATUS_PRIORITY: i32 = 5000;

const GREETER_TTL: Duration = Duration::from_secs(60);

/// Register the built-in handler set.
pub fn register_all(registry: &Arc<HandlerRegistry>, claims: &Arc<ContextClaims>) -> Result<()> {
    registry.register(HandlerDescriptor::enhancer(
        "console-reply",
        ENHANCER_PRIORITY,
        Arc::new(ConsoleReplyEnhancer::new()),
    ))?;
    registry.register(
        HandlerDescriptor::normal("ping", PING_PRIORITY, Arc::new(Ping))
            .with_kinds(KindFilter::only([PostType::Message]))
            .with_trigger(Trigger::pattern("^#ping$")?),
    )?;
    registry.register(
        HandlerDescriptor::normal("greeter", GREETER_PRIORITY, Arc::new(Greeter))
            .with_kinds(KindFilter::only([PostType::Message]))
            .with_trigger(Trigger::pattern("^#hello$")?),
    )?;
    registry.register(
        HandlerDescriptor::normal(
            "status",
            STATUS_PRIORITY,
            Arc::new(Status::new(registry, claims)),
        )
        .with_kinds(KindFilter::only([PostType::Message]))
        .with_trigger(Trigger::pattern("^#status$")?),
    )?;
    Ok(())
}

struct Ping;

#[async_trait]
impl Handler for Ping {
    async fn handle(&self, event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
        event.reply("pong").await?;
        Ok(true)
    }
}

/// Multi-turn exchange: `#hello` claims the sender's scope and asks for a
/// name; the next message in that scope — whatever its text — is the answer.
struct Greeter;

#[async_trait]
impl Handler for Greeter {
    async fn handle(&self, event: &CanonicalEvent, cx: &HandlerCx) -> anyhow::Result<bool> {
        let text = event.text().unwrap_or_default();
        if text == "#hello" {
            let claimed = cx.set_context(
                false,
                GREETER_TTL,
                Some("Still there? Never mind.".to_string()),
            );
            event.reply("Hi! What should I call you?").await?;
            // On a re-trigger inside the live claim `claimed` is false,
            // which keeps the claim for the real answer.
            return Ok(claimed);
        }
        let name = if text.is_empty() {
            event.actor.display_name.clone()
        } else {
            text.to_string()
        };
        event.reply(format!("Nice to meet you, {name}!")).await?;
        Ok(true)
    }
}

struct Status {
    registry: Arc<HandlerRegistry>,
    claims: Arc<ContextClaims>,
    started: Instant,
}

impl Status {
    fn new(registry: &Arc<HandlerRegistry>, claims: &Arc<ContextClaims>) -> Self {
        Self {
            registry: Arc::clone(registry),
            claims: Arc::clone(claims),
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl Handler for Status {
    async fn handle(&self, event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
        event
            .reply(format!(
                "up {}s, {} handlers registered, {} live claims",
                self.started.elapsed().as_secs(),
                self.registry.len(),
                self.claims.active()
            ))
            .await?;
        Ok(true)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        switchyard_dispatch::{DispatchEngine, DispatchOutcome, Enhancer},
        switchyard_events::{RawEvent, ReplyContent, ReplySink},
    };

    use super::*;

    struct RecordingReply {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingReply {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingReply {
        async fn send(&self, content: ReplyContent) -> switchyard_events::Result<bool> {
            self.sent.lock().unwrap().push(content.flat_text());
            Ok(true)
        }
    }

    struct BindReply {
        sink: Arc<RecordingReply>,
    }

    #[async_trait]
    impl Enhancer for BindReply {
        async fn enrich(&self, event: &mut CanonicalEvent) -> anyhow::Result<()> {
            event.set_reply(Arc::clone(&self.sink) as Arc<dyn ReplySink>);
            Ok(())
        }
    }

    fn pipeline() -> (Arc<DispatchEngine>, Arc<RecordingReply>) {
        let registry = Arc::new(HandlerRegistry::new());
        let claims = ContextClaims::new();
        register_all(&registry, &claims).unwrap();

        let reply = RecordingReply::new();
        registry
            .register(HandlerDescriptor::enhancer("bind-reply", 50, Arc::new(BindReply {
                sink: Arc::clone(&reply),
            })))
            .unwrap();

        (DispatchEngine::new(registry, claims), reply)
    }

    fn message(event_id: &str, text: &str) -> RawEvent {
        let mut raw = RawEvent::message("console", "bot", "1", text);
        raw.event_id = Some(event_id.to_string());
        raw
    }

    #[tokio::test]
    async fn ping_replies_pong() {
        let (engine, reply) = pipeline();
        let outcome = engine.dispatch(message("e1", "#ping")).await;
        assert_eq!(outcome, DispatchOutcome::Handled {
            handler: "ping".to_string()
        });
        assert_eq!(reply.messages(), vec!["pong".to_string()]);
    }

    #[tokio::test]
    async fn status_reports_registry_state() {
        let (engine, reply) = pipeline();
        let outcome = engine.dispatch(message("e1", "#status")).await;
        assert_eq!(outcome, DispatchOutcome::Handled {
            handler: "status".to_string()
        });
        let messages = reply.messages();
        assert_eq!(messages.len(), 1);
        // console-reply, bind-reply, ping, greeter, status.
        assert!(messages[0].contains("5 handlers registered"), "{}", messages[0]);
    }

    #[tokio::test]
    async fn greeter_runs_a_full_multi_turn_exchange() {
        let (engine, reply) = pipeline();

        // Turn one: claim the scope, ask for a name.
        let outcome = engine.dispatch(message("e1", "#hello")).await;
        assert_eq!(outcome, DispatchOutcome::Handled {
            handler: "greeter".to_string()
        });

        // Turn two would normally match ping, but the claim owns the scope.
        let outcome = engine.dispatch(message("e2", "Ada")).await;
        assert_eq!(outcome, DispatchOutcome::Claimed {
            owner: "greeter".to_string()
        });
        assert_eq!(reply.messages(), vec![
            "Hi! What should I call you?".to_string(),
            "Nice to meet you, Ada!".to_string(),
        ]);

        // Claim released; the walk is normal again.
        let outcome = engine.dispatch(message("e3", "#ping")).await;
        assert_eq!(outcome, DispatchOutcome::Handled {
            handler: "ping".to_string()
        });
    }
}
