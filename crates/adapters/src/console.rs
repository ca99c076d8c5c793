//! Console adapter: stdin lines in, stdout replies out.
//!
//! Useful for local development and as the reference adapter — it exercises
//! the whole pipeline with no external dependencies.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::debug,
};

use {
    switchyard_dispatch::{Enhancer, EventSink},
    switchyard_events::{CanonicalEvent, RawEvent, RawSender, ReplyContent, ReplySink},
};

use crate::{Adapter, error::Result, gate::forward};

pub const ADAPTER_ID: &str = "console";

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Bot identity stamped on every console event.
    pub self_id: String,
    /// Actor id attributed to console input.
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            self_id: "console-bot".to_string(),
            user_id: "1".to_string(),
            display_name: None,
        }
    }
}

/// Reads stdin line by line; each non-empty line becomes a message event.
pub struct ConsoleAdapter {
    config: ConsoleConfig,
}

impl ConsoleAdapter {
    #[must_use]
    pub fn new(config: ConsoleConfig) -> Self {
        Self { config }
    }

    fn line_event(&self, line: &str) -> RawEvent {
        let mut raw = RawEvent::message(
            ADAPTER_ID,
            self.config.self_id.clone(),
            self.config.user_id.clone(),
            line,
        );
        raw.sender = Some(RawSender {
            user_id: Some(self.config.user_id.clone()),
            nickname: self.config.display_name.clone(),
            role: None,
        });
        raw
    }
}

#[async_trait]
impl Adapter for ConsoleAdapter {
    fn id(&self) -> &str {
        ADAPTER_ID
    }

    async fn run(self: Box<Self>, sink: Arc<dyn EventSink>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            forward(sink.as_ref(), self.line_event(line));
        }
        debug!("console input closed");
        Ok(())
    }
}

/// Reply capability for console events: print to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReply;

#[async_trait]
impl ReplySink for ConsoleReply {
    async fn send(&self, content: ReplyContent) -> switchyard_events::Result<bool> {
        println!("switchyard> {}", content.flat_text());
        Ok(true)
    }
}

/// Binds the stdout reply sink to console events that arrive without one.
pub struct ConsoleReplyEnhancer {
    sink: Arc<ConsoleReply>,
}

impl ConsoleReplyEnhancer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: Arc::new(ConsoleReply),
        }
    }
}

impl Default for ConsoleReplyEnhancer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Enhancer for ConsoleReplyEnhancer {
    async fn enrich(&self, event: &mut CanonicalEvent) -> anyhow::Result<()> {
        if event.adapter_id() == ADAPTER_ID && !event.has_reply() {
            event.set_reply(Arc::clone(&self.sink) as Arc<dyn ReplySink>);
        }
        Ok(())
    }
}
