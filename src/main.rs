//! Convosync CLI binary entry point.

use std::sync::Arc;

use convosync::cli::{Cli, Commands, JsonLinesRenderer, WatchArgs};
use convosync::config::SyncConfig;
use convosync::engine::SyncEngine;
use convosync::fetcher::{HttpFetcher, SnapshotFetcher};
use convosync::scheduler::PollScheduler;
use convosync::types::ConversationId;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.load_config() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn log_filter() -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "convosync=info".to_string());
    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

async fn run(command: Commands, config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher: Arc<dyn SnapshotFetcher> = Arc::new(HttpFetcher::new(&config)?);

    match command {
        Commands::Watch(args) => watch(args, config, fetcher).await,
        Commands::Toggle(args) => {
            let engine = SyncEngine::new(config, fetcher, JsonLinesRenderer::stdout());
            let id = ConversationId::new(args.conversation);
            engine.refresh_flag(&id).await?;
            let enabled = engine.toggle(&id).await?;
            eprintln!("{id}: automated responses {}", if enabled { "on" } else { "off" });
            Ok(())
        }
        Commands::Send(args) => {
            let engine = SyncEngine::new(config, fetcher, JsonLinesRenderer::stdout());
            let id = ConversationId::new(args.conversation);
            engine.refresh_flag(&id).await?;
            engine.send(&id, &args.text).await?;
            Ok(())
        }
        Commands::Clear(args) => {
            let engine = SyncEngine::new(config, fetcher, JsonLinesRenderer::stdout());
            engine.clear(&ConversationId::new(args.conversation)).await?;
            Ok(())
        }
    }
}

async fn watch(
    args: WatchArgs,
    config: SyncConfig,
    fetcher: Arc<dyn SnapshotFetcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let renderer = JsonLinesRenderer::stdout();
    let output_closed = renderer.closed();
    let engine = SyncEngine::new(config, fetcher, renderer);
    if let Some(query) = &args.filter {
        engine.set_filter(query);
    }
    if let Some(conversation) = args.conversation {
        if let Err(e) = engine.select(&ConversationId::new(conversation)).await {
            tracing::warn!(error = %e, "initial history load failed; will retry on next poll");
        }
    }

    let handle = PollScheduler::new(engine).start()?;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        () = output_closed.cancelled() => {}
    }
    let stats = handle.stop().await;
    eprintln!(
        "stopped after {} ticks ({} cycles, {} failed, {} dropped)",
        stats.ticks, stats.completed, stats.failed, stats.dropped
    );
    Ok(())
}
