mod builtin;

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use {
    clap::Parser,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    switchyard_adapters::{Adapter, ConsoleAdapter, ConsoleConfig, WireFrameSender, wire_channel},
    switchyard_config::SwitchyardConfig,
    switchyard_dispatch::{ContextClaims, DispatchEngine, HandlerRegistry},
    switchyard_events::SourceDefaults,
};

#[derive(Parser)]
#[command(name = "switchyard", about = "Switchyard — deterministic event routing core")]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Config file path (skips the standard discovery locations).
    #[arg(long, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,
}

fn init_telemetry(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // An explicit --config path must load; discovery falls back to defaults.
    let config = match &cli.config {
        Some(path) => switchyard_config::load_config(path)?,
        None => switchyard_config::discover_and_load(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_telemetry(&level, cli.json_logs || config.logging.json);

    info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");
    run(config).await
}

async fn run(config: SwitchyardConfig) -> anyhow::Result<()> {
    let registry = Arc::new(HandlerRegistry::new());
    let claims = ContextClaims::new();
    claims.start_sweep(Duration::from_secs(
        config.dispatch.claim_sweep_interval_secs.max(1),
    ));

    let defaults = SourceDefaults {
        self_id: Some(config.identity.self_id.clone()),
        owner_id: config.identity.owner_id.clone(),
    };
    let per_adapter: HashMap<String, SourceDefaults> = ["console", "device", "wire"]
        .into_iter()
        .map(|id| (id.to_string(), defaults.clone()))
        .collect();

    let engine = DispatchEngine::with_config(
        Arc::clone(&registry),
        Arc::clone(&claims),
        config.dispatch.dedup_capacity,
        per_adapter,
    );

    builtin::register_all(&registry, &claims)?;

    let sink = engine.sink();
    if config.adapters.console.enabled {
        let adapter = ConsoleAdapter::new(ConsoleConfig {
            self_id: config.identity.self_id.clone(),
            user_id: config.adapters.console.user_id.clone(),
            display_name: config.adapters.console.display_name.clone(),
        });
        info!(
            user_id = %config.adapters.console.user_id,
            "console adapter ready; each stdin line dispatches as a message"
        );
        Box::new(adapter).run(sink).await?;
    } else if config.adapters.wire.enabled {
        let (frames, adapter) = wire_channel(
            Some(config.identity.self_id.clone()),
            config.adapters.wire.queue_capacity,
        );
        info!("wire adapter ready; feed newline-delimited JSON frames on stdin");
        let bridge = tokio::spawn(stdin_frames(frames));
        Box::new(adapter).run(sink).await?;
        let _ = bridge.await;
    } else {
        warn!("no stdin-driven adapter enabled; running until ctrl-c");
        tokio::signal::ctrl_c().await?;
    }

    claims.stop_sweep();
    info!("switchyard stopped");
    Ok(())
}

/// Feed newline-delimited JSON frames from stdin into the wire adapter.
/// Unparseable lines are skipped; the pipeline never stalls on garbage.
async fn stdin_frames(frames: WireFrameSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(frame) => {
                if frames.push(frame).await.is_err() {
                    break;
                }
            },
            Err(error) => warn!(error = %error, "unparseable wire frame skipped"),
        }
    }
}
