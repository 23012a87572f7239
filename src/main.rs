use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use lotto_sync::api::HttpUpstream;
use lotto_sync::bundle::{load_bundle, write_bundle};
use lotto_sync::cache::PersistentCache;
use lotto_sync::config;
use lotto_sync::connection::conn;
use lotto_sync::context::SyncContext;
use lotto_sync::schedule::SystemClock;
use lotto_sync::SyncEngine;

#[derive(Parser)]
#[command(name = "lotto-sync", about = "Keeps a local replica of Thai lottery results in sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll upstream on the publication schedule and log every update (default)
    Run,
    /// Load one Gregorian year of history and print it as JSON
    Year { year: i32 },
    /// Load the full upstream history
    Deep,
    /// Write the combined view as a bundled snapshot
    ExportBundle { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    tracing::info!("🎰 Starting lottery sync");

    let cache = PersistentCache::new(conn(&config.database_url)?, config.cache_quota_bytes);
    let upstream = Arc::new(HttpUpstream::new(config.upstream.clone()));
    let clock = Arc::new(SystemClock::new(config.utc_offset()?));
    let ctx = SyncContext::new(cache, upstream, clock, config.window_years);
    let engine = SyncEngine::new(ctx, config.batch_size);

    let bundled = load_bundle(&config.bundle_path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let mut events = engine.subscribe();
            engine.init(bundled).await;

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => tracing::info!(
                            kind = ?event.kind,
                            significant = event.significant,
                            date = ?event.draw.as_ref().map(|d| d.date),
                            status = %engine.status_message(),
                            "update"
                        ),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event consumer lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            engine.shutdown();
        }
        Command::Year { year } => {
            engine.load(bundled).await;
            engine.wait_for_gap_fill().await;
            let draws = engine.request_year_load(year).await;
            println!("{}", serde_json::to_string_pretty(&draws)?);
        }
        Command::Deep => {
            engine.load(bundled).await;
            engine.wait_for_gap_fill().await;
            let outcome = engine.request_deep_history_load().await;
            println!("{:?}: {} draws held", outcome, engine.combined().len());
        }
        Command::ExportBundle { path } => {
            engine.load(bundled).await;
            engine.wait_for_gap_fill().await;
            write_bundle(&path, &engine.combined())?;
        }
    }

    tracing::info!("👋 {}", engine.status_message());
    Ok(())
}
