//! # Topic Miner CLI (`tmine`)
//!
//! ## Usage
//!
//! ```bash
//! tmine --config ./config/tmine.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tmine init-config` | Write a commented example configuration |
//! | `tmine run --input <file>` | Mine one batch of feed entries |
//! | `tmine runs` | List runs in the file store |
//! | `tmine show <run_id>` | Print a stored run and its topics |
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default
//! `topic_miner=info,topic_miner_core=info`). Run summaries go to stdout.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use topic_miner::config::{self, Config, StorageMode, EXAMPLE_CONFIG};
use topic_miner::file_store::FileStore;
use topic_miner::ingest;
use topic_miner::pipeline::{self, RunReport};
use topic_miner_core::cluster::TermClusterer;
use topic_miner_core::models::Topic;
use topic_miner_core::store::memory::MemoryStore;
use topic_miner_core::store::RunStore;

const DEFAULT_LOG_FILTER: &str = "topic_miner=info,topic_miner_core=info";

/// Topic Miner: turn a batch of news feed entries into ranked, scored topics.
#[derive(Parser)]
#[command(
    name = "tmine",
    about = "Topic Miner: batch news topic mining with stable topic signatures",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tmine.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented example configuration.
    InitConfig {
        /// Output path. Defaults to the `--config` path.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Run the pipeline over a feed export.
    ///
    /// Reads JSON Lines entries, deduplicates, clusters, aggregates and
    /// scores them, writes `<output_dir>/<run_id>/topics.json` and
    /// `items.jsonl`, and records the run in the configured store.
    Run {
        /// Feed export (one JSON entry per line).
        #[arg(long)]
        input: PathBuf,
    },

    /// List runs recorded in the file store.
    Runs,

    /// Print a stored run's metadata and topics.
    Show {
        /// Run id, e.g. `run_20260213_120000_1a2b3c4d`.
        run_id: String,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Commands that don't require config
    if let Commands::InitConfig { out, force } = &cli.command {
        let path = out.as_deref().unwrap_or(&cli.config);
        return write_example_config(path, *force);
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::InitConfig { .. } => unreachable!(),
        Commands::Run { input } => run(&cfg, &input).await?,
        Commands::Runs => list_runs(&cfg).await?,
        Commands::Show { run_id } => show(&cfg, &run_id).await?,
    }

    Ok(())
}

fn write_example_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Config file created: {}", path.display());
    println!("Edit it, then run: tmine --config {} run --input <file>", path.display());
    Ok(())
}

async fn run(cfg: &Config, input: &Path) -> Result<()> {
    let entries = ingest::read_entries(input)?;
    let clusterer = TermClusterer::new(cfg.clustering.min_cluster_size, cfg.clustering.top_n_words);

    let report = match cfg.storage.mode {
        StorageMode::File => {
            let store = FileStore::open(&cfg.storage.base_dir).await?;
            pipeline::run_pipeline(cfg, entries, &clusterer, &store).await?
        }
        StorageMode::Memory => {
            let store = MemoryStore::new();
            pipeline::run_pipeline(cfg, entries, &clusterer, &store).await?
        }
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    let stats = &report.run.stats;
    let ratio = |key: &str| stats.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0) * 100.0;

    println!("Run ID: {}", report.run.run_id);
    println!("Status: {:?}", report.run.status);
    println!("Fetched: {} items", report.dedup.original_count);
    println!(
        "After dedupe: {} items ({} by url, {} by hash)",
        report.dedup.final_count, report.dedup.duplicates_by_url, report.dedup.duplicates_by_hash
    );
    println!(
        "Topics: {}{}",
        report.clustering.n_topics,
        if report.clustering.degraded {
            " (degraded)"
        } else {
            ""
        }
    );
    println!("Noise ratio: {:.1}%", ratio("noise_ratio"));
    println!("Missing summary: {:.1}%", ratio("missing_summary_ratio"));
    if let Some(output) = &report.output {
        println!("Output: {}", output.dir.display());
    }
    print_topics(&report.topics, 5);
}

fn print_topics(topics: &[Topic], limit: usize) {
    if topics.is_empty() {
        return;
    }
    println!();
    println!("Top {} topics:", topics.len().min(limit));
    for (i, topic) in topics.iter().take(limit).enumerate() {
        println!(
            "  {}. score={:.1} volume={} domains={} keywords=[{}]",
            i + 1,
            topic.narrative_signal_score.unwrap_or(0.0),
            topic.topic_volume,
            topic.unique_domains,
            topic
                .top_keywords
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

async fn open_file_store(cfg: &Config) -> Result<FileStore> {
    if cfg.storage.mode != StorageMode::File {
        bail!("storage.mode is not \"file\"; runs are not persisted between invocations");
    }
    FileStore::open(&cfg.storage.base_dir).await
}

async fn list_runs(cfg: &Config) -> Result<()> {
    let store = open_file_store(cfg).await?;
    let ids = store.list_runs().await?;
    if ids.is_empty() {
        println!("No runs recorded in {}", store.base_dir().display());
        return Ok(());
    }
    for id in ids {
        match store.load_run(&id).await? {
            Some(run) => println!("{}  {:?}  {}", run.run_id, run.status, run.generated_at),
            None => println!("{}", id),
        }
    }
    Ok(())
}

async fn show(cfg: &Config, run_id: &str) -> Result<()> {
    let store = open_file_store(cfg).await?;
    let Some(run) = store.load_run(run_id).await? else {
        bail!("Run not found: {}", run_id);
    };
    let topics = store.load_topics(run_id).await?;
    let items = store.load_items(run_id).await?;

    println!("{}", serde_json::to_string_pretty(&run)?);
    println!("Items: {}", items.len());
    print_topics(&topics, topics.len());
    Ok(())
}
