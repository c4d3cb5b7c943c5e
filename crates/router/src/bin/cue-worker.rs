//! cue-worker: runs the event pipeline against JSON-lines intake on stdin.
//!
//! Each stdin line is routed to the TikTok or Twitch adapter by its
//! `platform` field, then through middleware, rules and actions. Rules and
//! action records are read from the data directory on every event, so
//! edits take effect without a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, warn};

use streamcue_actions::{ActionDispatcher, ActionResolver, Flattener, Targets};
use streamcue_core::config::{load_dotenv, Config};
use streamcue_core::{DispatchMode, Platform};
use streamcue_middleware::{MiddlewarePipeline, MiddlewareRegistry};
use streamcue_router::{intake, ChannelAdapter, EventRouter};
use streamcue_rules::{FileStore, PredicateLibrary, RuleEvaluator};

// ── CLI ─────────────────────────────────────────────────────────────

/// Live-stream cue worker: middleware, rule matching and action dispatch.
#[derive(Parser, Debug)]
#[command(name = "cue-worker", version, about)]
struct Cli {
    /// Config profile (reads `{PROFILE}_{KEY}` before `{KEY}`).
    #[arg(long, env = "STREAMCUE_PROFILE", default_value = "")]
    profile: String,

    /// Override the data directory holding rules and actions.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the middleware chain YAML path.
    #[arg(long)]
    middleware: Option<PathBuf>,

    /// Override the dispatch mode (`spawned` or `awaited`).
    #[arg(long)]
    dispatch_mode: Option<String>,

    /// Seconds to wait for in-flight actions after intake ends.
    #[arg(long, env = "STREAMCUE_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::for_profile(&cli.profile);
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = dir;
    }
    if let Some(path) = cli.middleware {
        config.middleware.path = path;
    }
    if let Some(mode) = cli.dispatch_mode.as_deref() {
        config.dispatch.mode = mode.parse::<DispatchMode>()?;
    }
    config.log_summary();

    let library = Arc::new(PredicateLibrary::with_builtins());
    let registry = Arc::new(MiddlewareRegistry::with_builtins());
    let middleware = Arc::new(MiddlewarePipeline::load(registry, &config.middleware.path)?);
    info!(
        path = %config.middleware.path.display(),
        enabled = middleware.enabled_count(),
        "middleware chain loaded"
    );

    let store = Arc::new(FileStore::new(&config.store.data_dir));
    let resolver = ActionResolver::new(
        store.clone(),
        Flattener::new(config.store.flatten_separator.as_str()),
    );
    let targets = Targets::from_config(&config.dispatch)?;
    let dispatcher = ActionDispatcher::new(&targets, config.dispatch.mode);

    let router = Arc::new(EventRouter::new(
        store,
        RuleEvaluator::new(library),
        middleware,
        resolver,
        dispatcher,
    ));

    let adapters: HashMap<Platform, Arc<ChannelAdapter>> = [Platform::TikTok, Platform::Twitch]
        .into_iter()
        .map(|platform| (platform, Arc::new(ChannelAdapter::for_platform(platform))))
        .collect();

    let mut listeners = Vec::new();
    for adapter in adapters.values() {
        listeners.extend(router.attach(&**adapter));
    }

    info!("cue-worker reading events from stdin");
    let reader = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = intake::pump(reader, &adapters) => {
            let stats = result?;
            info!(
                lines = stats.lines,
                emitted = stats.emitted,
                rejected = stats.rejected,
                "intake reached end of input"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    for adapter in adapters.values() {
        adapter.close();
    }
    for listener in listeners {
        if let Err(e) = listener.await {
            warn!(error = %e, "listener task failed");
        }
    }

    let abandoned = router.drain(Duration::from_secs(cli.shutdown_timeout)).await;
    if abandoned > 0 {
        warn!(abandoned, "shutdown timeout reached with actions still running");
    }

    info!("cue-worker exited cleanly");
    Ok(())
}
