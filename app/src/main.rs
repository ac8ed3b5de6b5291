// In app/src/main.rs

use anyhow::{Context, Result};
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::{ExecutionOptions, TradeSignal};
use engine::TradingEngine;
use events::{InboundMessage, PipelineEvent};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Risk-checked signal execution pipeline.")]
struct Cli {
    /// Load settings from this TOML file instead of the layered `config/` lookup.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feeds `trade_execution` messages through the engine, one JSON object per line.
    Run {
        /// Path to a JSON-lines file of inbound messages. Reads stdin when omitted.
        #[arg(short, long)]
        signals: Option<PathBuf>,
    },

    /// Runs the risk check for a single signal without executing it.
    Evaluate {
        /// The signal as a JSON object.
        #[arg(short, long)]
        signal: String,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => app_config::load_settings_file(&path.to_string_lossy())?,
        None => app_config::load_settings()?,
    };

    let level = LevelFilter::from_str(&settings.app.log_level).unwrap_or(LevelFilter::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(environment = %settings.app.environment, "Starting Atlas application");

    match cli.command {
        Commands::Run { signals } => run_signals(&settings, signals).await?,
        Commands::Evaluate { signal } => evaluate_signal(&settings, &signal).await?,
    }

    tracing::info!("Atlas application has finished successfully.");
    Ok(())
}

// --- "Run" Subcommand Logic ---

/// Submits every message to the engine mailbox in order, printing each
/// response as a JSON line, then prints the portfolio and metrics summary.
async fn run_signals(settings: &Settings, path: Option<PathBuf>) -> Result<()> {
    let engine = Arc::new(TradingEngine::from_settings(settings)?);
    let log_task = tokio::spawn(log_events(engine.subscribe()));
    let (handle, mailbox) = engine::spawn(Arc::clone(&engine), settings.app.mailbox_capacity);

    let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match &path {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open signals file {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(reader).lines();

    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        let message: InboundMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(line = line_number, error = %e, "Skipping malformed message.");
                continue;
            }
        };
        let reply = handle.submit(message).await?;
        println!("{}", serde_json::to_string(&reply)?);
    }

    let portfolio = handle.portfolio().await?;
    let metrics = handle.metrics().await?;
    handle.shutdown().await?;
    mailbox.await?;

    println!("{}", serde_json::to_string_pretty(&portfolio)?);
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    // The engine owns the last sender; dropping it ends the event stream.
    drop(engine);
    log_task.await?;
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::debug!(?event, "Pipeline event."),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger fell behind.");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// --- "Evaluate" Subcommand Logic ---

async fn evaluate_signal(settings: &Settings, raw: &str) -> Result<()> {
    let signal: TradeSignal = serde_json::from_str(raw).context("Failed to parse signal JSON")?;
    let engine = TradingEngine::from_settings(settings)?;
    let decision = engine.evaluate(&signal, &ExecutionOptions::default()).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
