//! Run orchestration.
//!
//! One run takes the feed export through every stage and persists the
//! result:
//!
//! ```text
//! ingest → dedup → cluster → aggregate → score → top-K → output files → store
//! ```
//!
//! The run is recorded in [`RunMetadata`]. On success it is marked
//! `completed` with summary stats; on any error it is marked `failed`, the
//! message is stored under `stats.error`, the metadata is saved, and the
//! error is returned.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use topic_miner_core::aggregate::aggregate_topics;
use topic_miner_core::cluster::{assign_clusters, ClusterOutput, Clusterer};
use topic_miner_core::dedup::{dedupe_items, dedupe_items_parallel};
use topic_miner_core::models::{ClusterStats, DedupStats, Item, RunMetadata, RunStatus, Topic};
use topic_miner_core::scoring::{score_topics, Watchlist};
use topic_miner_core::select::top_k;
use topic_miner_core::store::RunStore;

use crate::config::Config;
use crate::ingest::{collect_items, IngestStats, RawEntry};
use crate::output::{write_run_output, OutputPaths};
use crate::url_normalize::DomainExtractor;

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub run: RunMetadata,
    /// Selected topics, best first.
    pub topics: Vec<Topic>,
    pub item_count: usize,
    pub dedup: DedupStats,
    pub clustering: ClusterStats,
    /// `None` when the run had no items and wrote no files.
    pub output: Option<OutputPaths>,
}

/// `run_<YYYYMMDD_HHMMSS>_<8 hex chars>`.
pub fn new_run_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Run the pipeline over `entries` with the current time as reference.
pub async fn run_pipeline(
    config: &Config,
    entries: Vec<RawEntry>,
    clusterer: &dyn Clusterer,
    store: &dyn RunStore,
) -> Result<RunReport> {
    run_pipeline_at(config, entries, clusterer, store, Utc::now()).await
}

/// Run the pipeline with an explicit reference instant, used for the
/// lookback window, fetch timestamps and velocity scoring.
pub async fn run_pipeline_at(
    config: &Config,
    entries: Vec<RawEntry>,
    clusterer: &dyn Clusterer,
    store: &dyn RunStore,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let run_id = new_run_id(now);
    let mut run = RunMetadata::new(&run_id, now, config.lookback_days, config.config_hash()?);
    info!(run_id = %run_id, entries = entries.len(), "starting run");

    match execute(config, entries, clusterer, store, &mut run, now).await {
        Ok(report) => Ok(report),
        Err(e) => {
            error!(run_id = %run.run_id, "run failed: {:#}", e);
            run.fail(format!("{:#}", e));
            if let Err(save_err) = store.save_run(&run).await {
                warn!(run_id = %run.run_id, "could not record failed run: {:#}", save_err);
            }
            Err(e)
        }
    }
}

async fn execute(
    config: &Config,
    entries: Vec<RawEntry>,
    clusterer: &dyn Clusterer,
    store: &dyn RunStore,
    run: &mut RunMetadata,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let extractor = DomainExtractor::new(&config.domains.extra_suffixes);
    let (items, ingest) = collect_items(entries, &run.run_id, config, &extractor, now);

    if items.is_empty() {
        warn!(run_id = %run.run_id, "no items collected, nothing to mine");
        run.status = RunStatus::Completed;
        run.stats = summary_stats(
            &ingest,
            &DedupStats::default(),
            &ClusterStats::default(),
            &[],
        );
        store.save_run(run).await?;
        return Ok(RunReport {
            run: run.clone(),
            topics: Vec::new(),
            item_count: 0,
            dedup: DedupStats::default(),
            clustering: ClusterStats::default(),
            output: None,
        });
    }

    let (items, dedup) = if config.dedupe_shards > 1 {
        dedupe_items_parallel(items, &config.dedupe_strategy, config.dedupe_shards)?
    } else {
        dedupe_items(items, &config.dedupe_strategy)?
    };

    let ClusterOutput {
        mut items,
        keywords,
        stats: clustering,
    } = assign_clusters(
        items,
        clusterer,
        config.min_items_to_cluster,
        config.noise_handling()?,
        config.global_random_seed,
    )?;

    let mut topics = aggregate_topics(&mut items, &keywords, &config.bucket_interval)?;

    let watchlist = Watchlist::new(&config.watchlist_keywords, &config.watchlist_tickers);
    score_topics(&mut topics, &watchlist, now);
    let topics = top_k(topics, config.top_k_topics);
    info!(run_id = %run.run_id, selected = topics.len(), "selected top topics");

    let output = write_run_output(&config.output_dir, &run.run_id, &topics, &items).await?;

    run.status = RunStatus::Completed;
    run.stats = summary_stats(&ingest, &dedup, &clustering, &items);
    store.save_run(run).await?;
    store.save_items(&items).await?;
    store.save_topics(&topics).await?;
    info!(run_id = %run.run_id, "run completed");

    Ok(RunReport {
        run: run.clone(),
        topics,
        item_count: items.len(),
        dedup,
        clustering,
        output: Some(output),
    })
}

fn summary_stats(
    ingest: &IngestStats,
    dedup: &DedupStats,
    clustering: &ClusterStats,
    items: &[Item],
) -> Map<String, Value> {
    let missing_summary = items.iter().filter(|i| !i.has_summary).count();
    let missing_summary_ratio = if items.is_empty() {
        0.0
    } else {
        missing_summary as f64 / items.len() as f64
    };

    let mut stats = Map::new();
    stats.insert("fetched_count".into(), json!(dedup.original_count));
    stats.insert("deduped_count".into(), json!(dedup.final_count));
    stats.insert("duplicates_by_url".into(), json!(dedup.duplicates_by_url));
    stats.insert("duplicates_by_hash".into(), json!(dedup.duplicates_by_hash));
    stats.insert("topic_count".into(), json!(clustering.n_topics));
    stats.insert("noise_ratio".into(), json!(clustering.noise_ratio));
    stats.insert("missing_summary_ratio".into(), json!(missing_summary_ratio));
    stats.insert("degraded".into(), json!(clustering.degraded));
    stats.insert("ingest".into(), json!(ingest));
    stats
}
