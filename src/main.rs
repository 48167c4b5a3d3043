//! # relay
//!
//! Conversational-avatar gateway binary: serves the WebSocket endpoint and
//! provides offline replay and transcript tools over recorded traces.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use relay_rules::RuleEngine;
use relay_server::ServerConfig;
use relay_settings::RelaySettings;
use relay_telemetry::{init_telemetry, parse_level, TelemetryConfig};
use relay_trace::{build_transcript, read_trace, read_trace_lenient, SessionRecorder};
use tracing::Level;

/// Conversational-avatar gateway.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Conversational-avatar WebSocket gateway")]
struct Cli {
    /// Settings file (defaults to ~/.relay/settings.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept avatar connections.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, 0 for auto-assign (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Re-run a recorded trace through the rules; fails on the first divergence.
    Replay {
        trace: PathBuf,
    },
    /// Print (or write) the transcript of a recorded trace.
    Transcript {
        trace: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn load_settings(path: Option<&Path>) -> Result<RelaySettings> {
    match path {
        Some(path) => relay_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => relay_settings::load_settings().context("Failed to load settings"),
    }
}

fn telemetry_config(settings: &RelaySettings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: parse_level(&settings.logging.level).unwrap_or(Level::INFO),
        json: settings.logging.json,
        ..TelemetryConfig::default()
    }
}

async fn serve(settings: &RelaySettings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from(&settings.server);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let engine = Arc::new(RuleEngine::from_settings(&settings.rules));
    let recorder = Arc::new(SessionRecorder::from_settings(&settings.recorder));
    tracing::info!(
        catalog = engine.catalog().len(),
        threshold = settings.rules.match_threshold,
        recording = recorder.is_enabled(),
        trace_dir = ?recorder.trace_dir(),
        "relay configured"
    );

    let handle = relay_server::start(config.clone(), engine, recorder)
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    tracing::info!(port = handle.port, "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

fn replay(settings: &RelaySettings, trace: &Path) -> Result<()> {
    let entries = read_trace(trace).with_context(|| format!("Failed to read {}", trace.display()))?;
    let engine = RuleEngine::from_settings(&settings.rules);

    match relay_trace::replay(&entries, &engine) {
        Ok(report) => {
            println!(
                "{}: {} inputs, {} outputs matched",
                trace.display(),
                report.inputs,
                report.outputs
            );
            Ok(())
        }
        Err(e) => bail!("{}: replay diverged: {e}", trace.display()),
    }
}

fn transcript(trace: &Path, out: Option<&Path>) -> Result<()> {
    let entries =
        read_trace_lenient(trace).with_context(|| format!("Failed to read {}", trace.display()))?;
    let Some(transcript) = build_transcript(&entries) else {
        bail!("{} has no entries", trace.display());
    };

    match out {
        Some(path) => transcript
            .write_to(path)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{transcript}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    init_telemetry(&telemetry_config(&settings)).context("Failed to initialize logging")?;

    match cli.command {
        Command::Serve { host, port } => serve(&settings, host, port).await,
        Command::Replay { trace } => replay(&settings, &trace),
        Command::Transcript { trace, out } => transcript(&trace, out.as_deref()),
    }
}
