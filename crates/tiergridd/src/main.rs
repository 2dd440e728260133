//! tiergridd — the TierGrid simulation runner.
//!
//! Loads a `tiergrid.toml`, builds the dispatcher with seeded random
//! traffic, and runs it tick by tick until the configured tick count or
//! Ctrl-C, whichever comes first. The run summary is printed either way.
//!
//! # Usage
//!
//! ```text
//! tiergridd init --output tiergrid.toml
//! tiergridd run --config tiergrid.toml --seed 7 --events events.jsonl
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use tiergrid_core::{FanoutSink, JsonLinesSink, SharedSink, SimConfig, TracingSink};
use tiergrid_dispatch::Dispatcher;

mod report;
mod runner;

#[derive(Parser)]
#[command(
    name = "tiergridd",
    about = "TierGrid — tiered request-routing simulator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulation.
    Run {
        /// Path to the config file.
        #[arg(short, long, default_value = "tiergrid.toml")]
        config: PathBuf,

        /// Override total_ticks from the config.
        #[arg(long)]
        ticks: Option<u64>,

        /// Override traffic.seed from the config.
        #[arg(long)]
        seed: Option<u64>,

        /// Write every engine event as JSON lines to this file.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Summary output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Write a starter config.
    Init {
        /// Destination file. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json)?;

    match cli.command {
        Command::Run {
            config,
            ticks,
            seed,
            events,
            format,
        } => run(&config, ticks, seed, events.as_deref(), format).await,
        Command::Init { output } => init(output.as_deref()),
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn run(
    config_path: &Path,
    ticks: Option<u64>,
    seed: Option<u64>,
    events: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_config(config_path, ticks, seed)?;
    info!(
        path = ?config_path,
        ticks = config.total_ticks,
        nodes = config.initial_nodes,
        seed = ?config.traffic.seed,
        "config loaded"
    );

    let sink = build_sink(events)?;
    let mut dispatcher = Dispatcher::with_random_traffic(&config, sink);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    runner::drive(&mut dispatcher, config.total_ticks, shutdown_rx).await;
    let summary = dispatcher.finish();

    match format {
        OutputFormat::Text => print!("{}", report::render_text(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

/// Read and validate the config, applying command-line overrides.
fn load_config(path: &Path, ticks: Option<u64>, seed: Option<u64>) -> anyhow::Result<SimConfig> {
    let mut config = SimConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    if let Some(ticks) = ticks {
        config.total_ticks = ticks;
    }
    if seed.is_some() {
        config.traffic.seed = seed;
    }
    config.validate().context("invalid command-line override")?;
    Ok(config)
}

fn build_sink(events: Option<&Path>) -> anyhow::Result<SharedSink> {
    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = events {
        let file = JsonLinesSink::create(path)
            .with_context(|| format!("failed to create event log {}", path.display()))?;
        info!(?path, "writing events");
        sink = sink.with(Arc::new(file));
    }
    Ok(Arc::new(sink))
}

fn init(output: Option<&Path>) -> anyhow::Result<()> {
    let rendered = SimConfig::scaffold().to_toml_string()?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(?path, "config written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
