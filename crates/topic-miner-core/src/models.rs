//! Core data models used throughout topic-miner.
//!
//! These types are the output contract handed to the downstream Gate:
//! per-article [`Item`]s and per-cluster [`Topic`]s, plus the [`RunMetadata`]
//! that describes the run that produced them. Field names are the wire
//! names used in `items.jsonl` and `topics.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hashing;

/// Topic id carried by items the clusterer could not place.
pub const NOISE_TOPIC: i64 = -1;

/// A collected entry after URL canonicalization, before it becomes an [`Item`].
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub source_name: String,
    pub source_weight: f64,
    pub canonical_url: String,
    pub publisher_domain: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

/// One collected article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable id: [`hashing::url_hash`] of the canonical URL.
    pub item_id: String,
    pub run_id: String,
    pub canonical_url: String,
    /// Registrable domain of the publisher (e.g. `reuters.com`).
    pub publisher_domain: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub source_name: String,
    #[serde(default = "default_source_weight")]
    pub source_weight: f64,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// Whether the original entry carried a summary. When it did not,
    /// `summary` holds a copy of the title.
    pub has_summary: bool,
    pub text_len: usize,
    pub content_hash: String,
    /// Cluster label; [`NOISE_TOPIC`] until clustering assigns one.
    pub topic_id: i64,
    /// Empty until aggregation assigns the topic signature.
    pub topic_signature: String,
    #[serde(default)]
    pub json_payload: Map<String, Value>,
}

fn default_source_weight() -> f64 {
    1.0
}

impl Item {
    /// Build an unclustered item for `run_id` from a collected entry.
    ///
    /// A missing or blank summary is replaced by the title so that the
    /// content hash and the clustering text are never title-only by accident.
    pub fn from_source(run_id: &str, source: SourceItem) -> Self {
        let summary = source
            .summary
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let has_summary = !summary.is_empty();
        let summary = if has_summary {
            summary
        } else {
            source.title.clone()
        };

        Item {
            item_id: hashing::url_hash(&source.canonical_url),
            run_id: run_id.to_string(),
            content_hash: hashing::content_hash(&source.title, &summary),
            text_len: source.title.chars().count() + summary.chars().count(),
            canonical_url: source.canonical_url,
            publisher_domain: source.publisher_domain,
            published_at: source.published_at,
            fetched_at: source.fetched_at,
            source_name: source.source_name,
            source_weight: source.source_weight,
            title: source.title,
            summary,
            has_summary,
            topic_id: NOISE_TOPIC,
            topic_signature: String::new(),
            json_payload: source.payload,
        }
    }

    /// Text handed to the clustering collaborator.
    pub fn cluster_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    pub fn is_noise(&self) -> bool {
        self.topic_id == NOISE_TOPIC
    }
}

/// Item count for one time bucket of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicBucket {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM-DDTHH:00:00+00:00` for hourly.
    pub bucket_start: String,
    pub count: usize,
}

/// Reduced view of an [`Item`] shown as an example of its topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeItem {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
}

/// One aggregated cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub run_id: String,
    pub topic_id: i64,
    /// Stable across runs for the same ranked keywords and publishers.
    pub topic_signature: String,
    #[serde(default)]
    pub top_keywords: Vec<String>,
    pub topic_volume: usize,
    pub unique_domains: usize,
    pub avg_source_weight: f64,
    pub duplicate_ratio: f64,
    #[serde(default)]
    pub counts_by_bucket: Vec<TopicBucket>,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub representative_items: Vec<RepresentativeItem>,
    /// Preliminary 0-100 score; `None` until scoring runs.
    pub narrative_signal_score: Option<f64>,
    #[serde(default)]
    pub json_payload: Map<String, Value>,
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Metadata recorded once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub config_hash: String,
    pub status: RunStatus,
    /// Free-form counters (fetched, deduped, topic count, error message...).
    #[serde(default)]
    pub stats: Map<String, Value>,
}

impl RunMetadata {
    pub fn new(
        run_id: &str,
        generated_at: DateTime<Utc>,
        lookback_days: u32,
        config_hash: String,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            generated_at,
            lookback_days,
            config_hash,
            status: RunStatus::Running,
            stats: Map::new(),
        }
    }

    /// Mark the run failed and record the error message under `stats.error`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.stats
            .insert("error".to_string(), Value::String(message.into()));
    }
}

/// Counters produced by the Dedup Engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    pub original_count: usize,
    pub duplicates_by_url: usize,
    pub duplicates_by_hash: usize,
    pub final_count: usize,
}

/// Counters produced by the clustering step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub n_items: usize,
    pub n_topics: usize,
    pub noise_count: usize,
    pub noise_ratio: f64,
    /// True when the batch was too small to cluster and became one topic.
    pub degraded: bool,
}
