//! xval-arbiter - Cross-source validation and arbitration CLI
//!
//! Reads facet snapshots as JSON, runs detection, scoring and arbitration,
//! and writes the engine reports as JSON.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use xval_arbiter::reliability::{self, RELIABILITY_TABLE_VERSION};
use xval_arbiter::{run_batch, DataKind, EngineConfig, FacetSnapshot, RunContext, ValidationEngine};
use xval_common::config::{write_toml_config, ConfigResolver};
use xval_common::logging::{init_tracing, with_bootstrap_logging};
use xval_common::TomlConfig;

#[derive(Parser)]
#[command(name = "xval-arbiter")]
#[command(about = "Cross-source validation and arbitration of entity facets")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides XVAL_CONFIG and the user config file)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one facet snapshot
    Validate {
        /// Snapshot JSON file ("-" for stdin)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Report file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Run id; derived from the entity and start time when omitted
        #[arg(long)]
        run_id: Option<Uuid>,

        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a JSON array of facet snapshots concurrently
    Batch {
        /// JSON array of snapshots ("-" for stdin)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Report file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Snapshots validated in parallel
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Abort the whole batch after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Pretty-print the JSON reports
        #[arg(long)]
        pretty: bool,
    },

    /// Print the source reliability table
    Sources {
        /// Only show entries for this data kind (e.g. population, location)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Destination TOML file
        #[arg(long)]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = with_bootstrap_logging(|| {
        ConfigResolver::new("config").resolve(cli.config.as_deref())
    })
    .context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;
    info!("xval-arbiter v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Validate {
            input,
            output,
            run_id,
            pretty,
        } => {
            let facets: FacetSnapshot = read_json(&input)?;
            let started_at = Utc::now();
            let ctx = match run_id {
                Some(id) => RunContext::new(id, started_at),
                None => RunContext::deterministic(&facets.entity_id, started_at),
            };
            let engine = ValidationEngine::new(EngineConfig::from(&config));
            let report = engine.run(&facets, &ctx);
            write_json(output.as_deref(), &report, pretty)
        }

        Commands::Batch {
            input,
            output,
            concurrency,
            timeout_secs,
            pretty,
        } => {
            if concurrency == 0 {
                bail!("--concurrency must be at least 1");
            }
            let snapshots: Vec<FacetSnapshot> = read_json(&input)?;
            let started_at = Utc::now();
            let jobs: Vec<(FacetSnapshot, RunContext)> = snapshots
                .into_iter()
                .map(|facets| {
                    let ctx = RunContext::deterministic(&facets.entity_id, started_at);
                    (facets, ctx)
                })
                .collect();
            info!(jobs = jobs.len(), concurrency, "Starting batch");

            let engine = Arc::new(ValidationEngine::new(EngineConfig::from(&config)));
            let batch = run_batch(engine, jobs, concurrency);
            let reports = match timeout_secs {
                Some(secs) => tokio::time::timeout(Duration::from_secs(secs), batch)
                    .await
                    .with_context(|| format!("Batch timed out after {} s", secs))??,
                None => batch.await?,
            };
            write_json(output.as_deref(), &reports, pretty)
        }

        Commands::Sources { kind } => {
            let filter = match kind.as_deref() {
                Some(label) => Some(
                    DataKind::parse(label)
                        .with_context(|| format!("Unknown data kind: {}", label))?,
                ),
                None => None,
            };
            print_sources(filter)
        }

        Commands::InitConfig { path } => {
            write_toml_config(&TomlConfig::default(), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: Option<&Path>, value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

fn print_sources(filter: Option<DataKind>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Reliability table v{}", RELIABILITY_TABLE_VERSION)?;
    for entry in reliability::entries()
        .iter()
        .filter(|e| filter.map_or(true, |kind| e.kind == kind))
    {
        writeln!(
            stdout,
            "{:<20} {:<24} {:>5.0}  {}",
            entry.source, entry.kind.as_str(), entry.score, entry.rationale
        )?;
    }
    Ok(())
}
