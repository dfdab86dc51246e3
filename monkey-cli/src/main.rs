//! Monkey CLI
//!
//! Runs exploration sessions against a UI tree fixture and inspects trees.
//!
//! Usage from workspace root:
//!   cargo run --bin monkey -- run --config monkey.yaml --tree screen.json
//!   cargo run --bin monkey -- check-config --config monkey.yaml
//!   cargo run --bin monkey -- query --tree screen.json "class:android.widget.Button"

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use monkey::dump::safe_text;
use monkey::platforms::memory::{MemoryDevice, MemoryNodeSpec};
use monkey::{AttributeQuery, NodeDump, Session, SessionStatus};
use monkey_recorder::{EventRecorder, EventRecorderConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod host;
mod log_capture;
mod utils;

use config::{resolve_config, ConfigOverrides};
use host::LocalHost;
use log_capture::LogCapture;
use utils::init_logging;

/// Entries kept for one set's log dump
const MAX_CAPTURED_LOGS: usize = 10_000;

#[derive(Parser)]
#[command(name = "monkey")]
#[command(about = "Randomized UI exploration driven by an accessibility tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Configuration file (JSON or YAML)
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// UI tree fixture (JSON) shown as the foreground window
    #[clap(long, short = 't')]
    tree: PathBuf,

    /// Directory receiving set logs, captured logs and status markers
    #[clap(long, short = 'o', default_value = "monkey-logs")]
    output_dir: PathBuf,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Parser, Debug)]
struct CheckConfigArgs {
    /// Configuration file (JSON or YAML)
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[derive(Parser, Debug)]
struct QueryArgs {
    /// UI tree fixture (JSON)
    #[clap(long, short = 't')]
    tree: PathBuf,

    /// `class:<a>|<b>`, `text:<a>|<b>`, `clickable` or `scrollable`
    query: String,

    /// Print the matching subtrees as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a fixture tree until the set limit ends the session
    Run(RunArgs),
    /// Load, validate and print a configuration
    CheckConfig(CheckConfigArgs),
    /// List the nodes of a fixture tree matching a query
    Query(QueryArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::CheckConfig(args) => check_config(args),
        Commands::Query(args) => query(args),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let capture = LogCapture::new(MAX_CAPTURED_LOGS);
    init_logging(Some(capture.clone()))?;
    capture.start_capture();

    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    let spec = MemoryNodeSpec::load(&args.tree)
        .with_context(|| format!("Failed to load tree {}", args.tree.display()))?;

    let recorder = EventRecorder::new(EventRecorderConfig::new(
        &args.output_dir,
        config.package_name.clone(),
    ))
    .context("Failed to set up the event recorder")?;
    let device = Arc::new(MemoryDevice::new());
    let host = Arc::new(LocalHost::new(&args.output_dir, capture, device.clone()));

    info!(
        package = %config.package_name,
        tree = %args.tree.display(),
        output_dir = %host.output_dir().display(),
        "Starting dry run"
    );
    let session = Session::configure(config, device.clone(), host.clone(), Box::new(recorder))?;
    session.start().await.context("Failed to start session")?;
    session
        .on_snapshot_delivered(device.show(spec))
        .await
        .context("First pass failed")?;

    tokio::select! {
        _ = session.terminated() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
        }
    }
    session.shutdown().await;

    match host.status() {
        Some(SessionStatus::Done) => {
            info!("Exploration finished");
            Ok(())
        }
        Some(SessionStatus::Failed) => bail!("Exploration failed"),
        None => {
            info!("Exploration stopped before the set limit");
            Ok(())
        }
    }
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    init_logging(None)?;
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn query(args: QueryArgs) -> Result<()> {
    init_logging(None)?;
    let query: AttributeQuery = args.query.parse()?;
    let spec = MemoryNodeSpec::load(&args.tree)
        .with_context(|| format!("Failed to load tree {}", args.tree.display()))?;
    let root = MemoryDevice::new().build(spec);

    let matches = monkey::search(Some(&root), &query);
    if args.json {
        let dumps: Vec<NodeDump> = matches.iter().map(NodeDump::capture).collect();
        println!("{}", serde_json::to_string_pretty(&dumps)?);
        return Ok(());
    }

    for node in &matches {
        let attributes = node.attributes();
        println!(
            "{}\t{}\t{}\t{}",
            attributes.bounds.to_short_string(),
            attributes.class_name,
            attributes.resource_id,
            safe_text(&attributes.text)
        );
    }
    println!("{} node(s) match {query}", matches.len());
    Ok(())
}
