//! conflux-import - reconcile an import batch into canonical collections
//!
//! Reads the canonical collections, the import batch and (optionally) the
//! persisted identifier registry as JSON, and writes the reconciled
//! collections, change log, updated registry and batch summary as one JSON
//! document.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use conflux_common::config::load_config;
use conflux_common::LoggingConfig;
use conflux_import::{reconcile_batch, CanonicalCollections, IdRegistry, ImportBatch};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for conflux-import
#[derive(Parser, Debug)]
#[command(name = "conflux-import")]
#[command(about = "Reconcile imported conference-program records into canonical collections")]
#[command(version)]
struct Args {
    /// Import batch JSON: source name -> per-kind intermediary records
    #[arg(short, long)]
    import: PathBuf,

    /// Canonical collections JSON (empty collections when omitted)
    #[arg(short, long)]
    canonical: Option<PathBuf>,

    /// Identifier registry JSON from a previous batch
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Config file (overrides CONFLUX_CONFIG and the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level filter, overriding `[logging].level`
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging, args.log_level.as_deref())?;

    info!("Starting conflux-import v{}", env!("CARGO_PKG_VERSION"));

    let canonical: CanonicalCollections = match &args.canonical {
        Some(path) => read_json(path)?,
        None => CanonicalCollections::default(),
    };
    let registry: IdRegistry = match &args.registry {
        Some(path) => read_json(path)?,
        None => IdRegistry::new(),
    };
    let batch: ImportBatch = read_json(&args.import)?;

    let output = match reconcile_batch(config.matching, registry, canonical, batch) {
        Ok(output) => output,
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            return Err(e).context("Import batch rejected");
        }
    };

    let rendered = serde_json::to_string_pretty(&output).context("Failed to render output")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_override.unwrap_or(&logging.level)))
        .context("Invalid log level")?;

    // Logs go to stderr so stdout stays clean for the JSON output
    match &logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
