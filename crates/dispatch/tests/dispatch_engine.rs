//! End-to-end dispatch behavior: ordering, idempotency, short-circuit,
//! claims, isolation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use {
    switchyard_dispatch::{
        ContextClaims, DispatchEngine, DispatchOutcome, Enhancer, Handler, HandlerCx,
        HandlerDescriptor, HandlerRegistry, KindFilter, Trigger,
    },
    switchyard_events::{CanonicalEvent, PostType, RawEvent, ReplyContent, ReplySink, Role},
};

// ── Test fixtures ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// A normal handler that records its invocation and returns a fixed result.
struct Probe {
    name: &'static str,
    recorder: Arc<Recorder>,
    handles: bool,
}

#[async_trait]
impl Handler for Probe {
    async fn handle(&self, _event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
        self.recorder.push(self.name);
        Ok(self.handles)
    }
}

struct Failing {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Handler for Failing {
    async fn handle(&self, _event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
        self.recorder.push("failing");
        anyhow::bail!("boom")
    }
}

struct TagEnhancer {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Enhancer for TagEnhancer {
    async fn enrich(&self, event: &mut CanonicalEvent) -> anyhow::Result<()> {
        self.recorder.push("enhancer");
        event.actor.display_name = "enhanced".to_string();
        Ok(())
    }
}

struct CaptureReply {
    sent: Mutex<Vec<String>>,
}

impl CaptureReply {
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
impl ReplySink for CaptureReply {
    async fn send(&self, content: ReplyContent) -> switchyard_events::Result<bool> {
        self.sent.lock().unwrap().push(content.flat_text());
        Ok(true)
    }
}

struct BindReply {
    sink: Arc<CaptureReply>,
}

#[async_trait]
impl Enhancer for BindReply {
    async fn enrich(&self, event: &mut CanonicalEvent) -> anyhow::Result<()> {
        event.set_reply(self.sink.clone());
        Ok(())
    }
}

fn engine() -> Arc<DispatchEngine> {
    DispatchEngine::new(Arc::new(HandlerRegistry::new()), ContextClaims::new())
}

fn probe(recorder: &Arc<Recorder>, name: &'static str, handles: bool) -> Arc<Probe> {
    Arc::new(Probe {
        name,
        recorder: Arc::clone(recorder),
        handles,
    })
}

fn message(event_id: &str, user_id: &str, text: &str) -> RawEvent {
    let mut raw = RawEvent::message("test", "bot", user_id, text);
    raw.event_id = Some(event_id.to_string());
    raw
}

// ── Idempotency ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_event_is_dispatched_once() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "h",
            1000,
            probe(&recorder, "h", true),
        ))
        .unwrap();

    let first = engine.dispatch(message("e1", "1", "hi")).await;
    let second = engine.dispatch(message("e1", "1", "hi")).await;

    assert_eq!(first, DispatchOutcome::Handled {
        handler: "h".to_string()
    });
    assert_eq!(second, DispatchOutcome::Duplicate);
    assert_eq!(recorder.entries(), ["h"]);
}

// ── Priority order ──────────────────────────────────────────────────────────

#[tokio::test]
async fn walk_order_is_ascending_priority_with_runtime_insert() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    // Registered deliberately out of order; none short-circuit.
    for (name, priority) in [("p4000", 4000), ("p100", 100), ("p5000", 5000), ("p1000", 1000)] {
        engine
            .registry()
            .register(HandlerDescriptor::normal(
                name,
                priority,
                probe(&recorder, name, false),
            ))
            .unwrap();
    }

    engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(recorder.entries(), ["p100", "p1000", "p4000", "p5000"]);

    // A handler inserted at runtime runs first on the next event.
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "p50",
            50,
            probe(&recorder, "p50", false),
        ))
        .unwrap();
    engine.dispatch(message("e2", "1", "hi")).await;
    assert_eq!(recorder.entries()[4..], [
        "p50".to_string(),
        "p100".to_string(),
        "p1000".to_string(),
        "p4000".to_string(),
        "p5000".to_string()
    ]);
}

#[tokio::test]
async fn equal_priority_ties_break_by_registration_order() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    for name in ["first", "second", "third"] {
        engine
            .registry()
            .register(HandlerDescriptor::normal(
                name,
                1000,
                probe(&recorder, name, false),
            ))
            .unwrap();
    }
    engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(recorder.entries(), ["first", "second", "third"]);
}

// ── Short-circuit ───────────────────────────────────────────────────────────

#[tokio::test]
async fn truthy_result_stops_the_walk_but_enhancers_already_ran() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::enhancer(
            "tag",
            100,
            Arc::new(TagEnhancer {
                recorder: Arc::clone(&recorder),
            }),
        ))
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "p1000",
            1000,
            probe(&recorder, "p1000", true),
        ))
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "p4000",
            4000,
            probe(&recorder, "p4000", false),
        ))
        .unwrap();

    let outcome = engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(outcome, DispatchOutcome::Handled {
        handler: "p1000".to_string()
    });
    assert_eq!(recorder.entries(), ["enhancer", "p1000"]);
}

#[tokio::test]
async fn enhancer_writes_are_visible_to_normal_handlers() {
    struct AssertEnhanced {
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl Handler for AssertEnhanced {
        async fn handle(&self, event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
            self.recorder.push(format!("saw:{}", event.actor.display_name));
            Ok(true)
        }
    }

    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::enhancer(
            "tag",
            100,
            Arc::new(TagEnhancer {
                recorder: Arc::clone(&recorder),
            }),
        ))
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "check",
            1000,
            Arc::new(AssertEnhanced {
                recorder: Arc::clone(&recorder),
            }),
        ))
        .unwrap();

    engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(recorder.entries(), ["enhancer", "saw:enhanced"]);
}

// ── Failure isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn handler_failure_never_aborts_the_walk() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "failing",
            1000,
            Arc::new(Failing {
                recorder: Arc::clone(&recorder),
            }),
        ))
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "fallback",
            2000,
            probe(&recorder, "fallback", true),
        ))
        .unwrap();

    let outcome = engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(outcome, DispatchOutcome::Handled {
        handler: "fallback".to_string()
    });
    assert_eq!(recorder.entries(), ["failing", "fallback"]);
}

// ── Gating ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn kind_and_role_gates_skip_non_matching_handlers() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal("notices", 1000, probe(&recorder, "notices", true))
                .with_kinds(KindFilter::only([PostType::Notice])),
        )
        .unwrap();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal("admin", 2000, probe(&recorder, "admin", true))
                .with_min_role(Role::Admin),
        )
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "anyone",
            3000,
            probe(&recorder, "anyone", true),
        ))
        .unwrap();

    // A plain member message skips both gated handlers.
    let outcome = engine.dispatch(message("e1", "1", "hi")).await;
    assert_eq!(outcome, DispatchOutcome::Handled {
        handler: "anyone".to_string()
    });
    assert_eq!(recorder.entries(), ["anyone"]);

    // A notice event reaches the notice handler.
    let mut raw = RawEvent::new("test");
    raw.event_id = Some("e2".into());
    raw.self_id = Some("bot".into());
    raw.user_id = Some("1".into());
    raw.post_type = Some("notice".into());
    raw.notice_type = Some("member_join".into());
    let outcome = engine.dispatch(raw).await;
    assert_eq!(outcome, DispatchOutcome::Handled {
        handler: "notices".to_string()
    });
}

#[tokio::test]
async fn trigger_pattern_selects_the_handler() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal("status", 5000, probe(&recorder, "status", true))
                .with_trigger(Trigger::pattern("^#status$").unwrap()),
        )
        .unwrap();

    // The console scenario: `#status` from user 1.
    let outcome = engine.dispatch(message("e1", "1", "#status")).await;
    assert_eq!(outcome, DispatchOutcome::Handled {
        handler: "status".to_string()
    });

    let outcome = engine.dispatch(message("e2", "1", "#status please")).await;
    assert_eq!(outcome, DispatchOutcome::Unmatched);
    assert_eq!(recorder.entries(), ["status"]);
}

// ── Claims ──────────────────────────────────────────────────────────────────

/// Starts a multi-turn exchange on `#ask`; keeps the claim until "done".
struct MultiTurn {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Handler for MultiTurn {
    async fn handle(&self, event: &CanonicalEvent, cx: &HandlerCx) -> anyhow::Result<bool> {
        let text = event.text().unwrap_or_default();
        if text.starts_with("#ask") {
            let claimed = cx.set_context(false, Duration::from_secs(60), None);
            self.recorder.push(format!("ask:claimed={claimed}"));
            return Ok(true);
        }
        self.recorder.push(format!("turn:{text}"));
        Ok(text == "done")
    }
}

#[tokio::test]
async fn live_claim_routes_followups_to_the_owner_only() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal(
                "asker",
                1000,
                Arc::new(MultiTurn {
                    recorder: Arc::clone(&recorder),
                }),
            )
            .with_trigger(Trigger::pattern("^#ask").unwrap()),
        )
        .unwrap();
    // A catch-all that would otherwise take every message.
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "catchall",
            5000,
            probe(&recorder, "catchall", true),
        ))
        .unwrap();

    assert_eq!(
        engine.dispatch(message("e1", "7", "#ask")).await,
        DispatchOutcome::Handled {
            handler: "asker".to_string()
        }
    );
    // Both follow-ups go to the owner even though catchall matches.
    assert_eq!(
        engine.dispatch(message("e2", "7", "hello")).await,
        DispatchOutcome::Claimed {
            owner: "asker".to_string()
        }
    );
    assert_eq!(
        engine.dispatch(message("e3", "7", "done")).await,
        DispatchOutcome::Claimed {
            owner: "asker".to_string()
        }
    );
    // "done" released the claim; the next event walks normally.
    assert_eq!(
        engine.dispatch(message("e4", "7", "hello again")).await,
        DispatchOutcome::Handled {
            handler: "catchall".to_string()
        }
    );
    assert_eq!(recorder.entries(), [
        "ask:claimed=true",
        "turn:hello",
        "turn:done",
        "catchall"
    ]);

    // A different user's scope was never claimed.
    assert_eq!(
        engine.dispatch(message("e5", "8", "hello")).await,
        DispatchOutcome::Handled {
            handler: "catchall".to_string()
        }
    );
}

#[tokio::test]
async fn expired_claim_sends_timeout_and_restores_normal_walk() {
    let recorder = Arc::new(Recorder::default());
    let reply = CaptureReply::new();
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::enhancer(
            "bind-reply",
            100,
            Arc::new(BindReply {
                sink: Arc::clone(&reply),
            }),
        ))
        .unwrap();

    struct ClaimWithTimeout;

    #[async_trait]
    impl Handler for ClaimWithTimeout {
        async fn handle(&self, _event: &CanonicalEvent, cx: &HandlerCx) -> anyhow::Result<bool> {
            cx.set_context(
                false,
                Duration::from_millis(30),
                Some("timed out".to_string()),
            );
            Ok(true)
        }
    }

    engine
        .registry()
        .register(
            HandlerDescriptor::normal("claimer", 1000, Arc::new(ClaimWithTimeout))
                .with_trigger(Trigger::pattern("^#claim$").unwrap()),
        )
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "catchall",
            5000,
            probe(&recorder, "catchall", true),
        ))
        .unwrap();

    engine.claims().start_sweep(Duration::from_millis(10));
    engine.dispatch(message("e1", "7", "#claim")).await;
    assert_eq!(engine.claims().owner_of(&switchyard_events::Scope::user("7")), Some("claimer".to_string()));

    tokio::time::sleep(Duration::from_millis(120)).await;
    engine.claims().stop_sweep();

    assert_eq!(reply.messages(), vec!["timed out".to_string()]);
    // The claim is gone; the next message from user 7 walks normally.
    assert_eq!(
        engine.dispatch(message("e2", "7", "hello")).await,
        DispatchOutcome::Handled {
            handler: "catchall".to_string()
        }
    );
}

#[tokio::test]
async fn unregistered_owner_releases_the_claim() {
    let recorder = Arc::new(Recorder::default());
    let engine = engine();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal(
                "asker",
                1000,
                Arc::new(MultiTurn {
                    recorder: Arc::clone(&recorder),
                }),
            )
            .with_trigger(Trigger::pattern("^#ask").unwrap()),
        )
        .unwrap();
    engine
        .registry()
        .register(HandlerDescriptor::normal(
            "catchall",
            5000,
            probe(&recorder, "catchall", true),
        ))
        .unwrap();

    engine.dispatch(message("e1", "7", "#ask")).await;
    assert!(engine.registry().unregister("asker"));

    // The orphaned claim is released and the event falls back to the walk.
    assert_eq!(
        engine.dispatch(message("e2", "7", "hello")).await,
        DispatchOutcome::Handled {
            handler: "catchall".to_string()
        }
    );
    assert_eq!(
        engine
            .claims()
            .owner_of(&switchyard_events::Scope::user("7")),
        None
    );
}

// ── No match ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unmatched_event_is_dropped_quietly() {
    let engine = engine();
    assert_eq!(
        engine.dispatch(message("e1", "1", "hi")).await,
        DispatchOutcome::Unmatched
    );
}

// ── Reply capability ────────────────────────────────────────────────────────

#[tokio::test]
async fn enhancer_bound_reply_reaches_the_handler() {
    struct Replies;

    #[async_trait]
    impl Handler for Replies {
        async fn handle(&self, event: &CanonicalEvent, _cx: &HandlerCx) -> anyhow::Result<bool> {
            event.reply("pong").await?;
            Ok(true)
        }
    }

    let reply = CaptureReply::new();
    let engine = engine();
    engine
        .registry()
        .register(HandlerDescriptor::enhancer(
            "bind-reply",
            100,
            Arc::new(BindReply {
                sink: Arc::clone(&reply),
            }),
        ))
        .unwrap();
    engine
        .registry()
        .register(
            HandlerDescriptor::normal("ping", 5000, Arc::new(Replies))
                .with_trigger(Trigger::pattern("^#ping$").unwrap()),
        )
        .unwrap();

    engine.dispatch(message("e1", "1", "#ping")).await;
    assert_eq!(reply.messages(), vec!["pong".to_string()]);
}
