//! permitctl - replay permit workflow scenarios
//!
//! Loads configuration and the organization directory, replays a JSON
//! scenario through the permit service, then prints the resulting permit
//! snapshots and every notification that was dispatched.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use permit_notify::{NotificationDispatcher, RecordingDispatcher, TracingDispatcher};
use permit_service::{
    build_repository, load_directory, start_dispatch, PermitService, Scenario, ScenarioRunner,
    ServiceConfig,
};
use permit_storage::{PermitFilter, QueryWindow};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// permitctl CLI
#[derive(Parser)]
#[command(name = "permitctl")]
#[command(about = "Replay Job Permit / Permit to Work scenarios", long_about = None)]
#[command(version)]
struct Cli {
    /// Scenario script (JSON)
    scenario: String,

    /// Configuration file path
    #[arg(short, long, env = "PERMIT_CONFIG")]
    config: Option<String>,

    /// Directory seed file, overrides the configured one
    #[arg(short, long, env = "PERMIT_DIRECTORY")]
    directory: Option<String>,

    /// Log level
    #[arg(long, env = "PERMIT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PERMIT_LOG_JSON")]
    json: bool,

    /// Log notifications instead of recording them for the summary
    #[arg(long)]
    log_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = cli.log_level.clone() {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(path) = cli.directory.clone() {
        config.directory.seed_file = Some(path);
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let script = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("reading scenario {}", cli.scenario))?;
    let scenario = Scenario::from_json(&script)
        .with_context(|| format!("parsing scenario {}", cli.scenario))?;

    let directory = Arc::new(load_directory(&config.directory)?);
    let repository = build_repository(&config.storage).await?;

    let recorder = Arc::new(RecordingDispatcher::new());
    let dispatcher: Arc<dyn NotificationDispatcher> = if cli.log_only {
        Arc::new(TracingDispatcher)
    } else {
        recorder.clone()
    };
    let (queue, worker) = start_dispatch(&config.dispatch, dispatcher);

    let service = Arc::new(PermitService::new(repository.clone(), directory.clone(), queue));
    let mut runner = ScenarioRunner::new(service.clone(), directory);
    let outcomes = runner.run(&scenario).await;

    // Closing the queue lets the worker drain and exit
    drop(runner);
    drop(service);
    let stats = match worker {
        Some(handle) => Some(handle.await.context("dispatch worker panicked")?),
        None => None,
    };

    println!("== Steps ==");
    for outcome in &outcomes {
        match &outcome.error {
            None => {
                let permits: Vec<String> = outcome
                    .permits
                    .iter()
                    .map(|(id, status)| format!("{} -> {}", id, status))
                    .collect();
                println!("[{:>2}] {:<22} ok    {}", outcome.index, outcome.op, permits.join(", "));
            }
            Some(error) => {
                println!("[{:>2}] {:<22} error {}", outcome.index, outcome.op, error);
            }
        }
    }

    println!("\n== Permits ==");
    let permits = repository
        .list(&PermitFilter::default(), QueryWindow::default())
        .await?;
    for stored in &permits {
        println!("{}", serde_json::to_string_pretty(&stored.entity)?);
    }

    if !cli.log_only {
        println!("\n== Notifications ==");
        for sent in recorder.sent() {
            println!(
                "{:<22} {:<12} -> {}",
                sent.event_kind,
                sent.payload.get("permit_id").map(String::as_str).unwrap_or_default(),
                sent.emails().join(", ")
            );
        }
    }

    if let Some(stats) = stats {
        tracing::info!(
            delivered = stats.delivered,
            failed = stats.failed,
            skipped = stats.skipped,
            "Dispatch finished"
        );
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if failed > 0 {
        tracing::warn!(failed, total = outcomes.len(), "Some scenario steps failed");
    }
    Ok(())
}
