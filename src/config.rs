//! TOML configuration.
//!
//! All run behaviour comes from one file (default `./config/tmine.toml`).
//! Every field has a default, so an empty file is a valid configuration.
//! [`load_config`] validates after parsing and fails fast on unknown
//! strategies or out-of-range values; nothing falls back silently.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use topic_miner_core::aggregate::BucketInterval;
use topic_miner_core::cluster::NoiseHandling;
use topic_miner_core::dedup::DedupStrategy;
use topic_miner_core::hashing;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
    #[serde(default = "default_top_k_topics")]
    pub top_k_topics: usize,
    #[serde(default = "default_min_items_to_cluster")]
    pub min_items_to_cluster: usize,
    #[serde(default = "default_seed")]
    pub global_random_seed: u64,
    #[serde(default = "default_dedupe_strategy")]
    pub dedupe_strategy: String,
    /// Values above 1 split each dedup phase across this many threads.
    #[serde(default = "default_dedupe_shards")]
    pub dedupe_shards: usize,
    #[serde(default = "default_noise_handling")]
    pub noise_handling: String,
    #[serde(default = "default_bucket_interval")]
    pub bucket_interval: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub watchlist_keywords: Vec<String>,
    #[serde(default)]
    pub watchlist_tickers: Vec<String>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
}

fn default_lookback_days() -> u32 {
    7
}
fn default_max_items_per_feed() -> usize {
    50
}
fn default_top_k_topics() -> usize {
    10
}
fn default_min_items_to_cluster() -> usize {
    30
}
fn default_seed() -> u64 {
    42
}
fn default_dedupe_strategy() -> String {
    DedupStrategy::UrlThenHash.as_str().to_string()
}
fn default_dedupe_shards() -> usize {
    1
}
fn default_noise_handling() -> String {
    NoiseHandling::Drop.as_str().to_string()
}
fn default_bucket_interval() -> String {
    BucketInterval::Daily.as_str().to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

/// One configured news feed. The ingest step matches entries to feeds by
/// `name` to fill in weight and payload metadata.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_feed_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_feed_weight() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusteringConfig {
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default = "default_top_n_words")]
    pub top_n_words: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            top_n_words: default_top_n_words(),
        }
    }
}

fn default_min_cluster_size() -> usize {
    5
}
fn default_top_n_words() -> usize {
    15
}

/// Where run metadata, items and topics are persisted.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            base_dir: default_base_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("memory")
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DomainsConfig {
    /// Multi-label public suffixes added to the built-in list (e.g. `com.sg`).
    #[serde(default)]
    pub extra_suffixes: Vec<String>,
}

impl Config {
    pub fn dedupe_strategy(&self) -> Result<DedupStrategy> {
        Ok(self.dedupe_strategy.parse()?)
    }

    pub fn noise_handling(&self) -> Result<NoiseHandling> {
        Ok(self.noise_handling.parse()?)
    }

    pub fn bucket_interval(&self) -> Result<BucketInterval> {
        Ok(self.bucket_interval.parse()?)
    }

    /// Configured feed with this name, if any.
    pub fn feed(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name == name)
    }

    /// Digest of the fields that change run results.
    pub fn config_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self).context("Failed to serialize config")?;
        Ok(hashing::config_hash(&value))
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.lookback_days == 0 {
        anyhow::bail!("lookback_days must be >= 1");
    }

    if config.top_k_topics == 0 {
        anyhow::bail!("top_k_topics must be >= 1");
    }

    if config.max_items_per_feed == 0 {
        anyhow::bail!("max_items_per_feed must be >= 1");
    }

    if config.dedupe_shards == 0 {
        anyhow::bail!("dedupe_shards must be >= 1");
    }

    if config.clustering.min_cluster_size == 0 {
        anyhow::bail!("clustering.min_cluster_size must be >= 1");
    }

    for feed in &config.feeds {
        if feed.name.trim().is_empty() {
            anyhow::bail!("feeds: every feed needs a name (url: {})", feed.url);
        }
        if !(0.0..=1.0).contains(&feed.weight) {
            anyhow::bail!(
                "feeds.{}.weight must be in [0.0, 1.0], got {}",
                feed.name,
                feed.weight
            );
        }
    }

    config.dedupe_strategy()?;
    config.noise_handling()?;
    config.bucket_interval()?;

    Ok(())
}

/// Commented example written by `tmine init-config`.
pub const EXAMPLE_CONFIG: &str = r#"# topic-miner configuration

# Entries published before now - lookback_days are ignored.
lookback_days = 7
# Entries taken per source, in file order.
max_items_per_feed = 50
# Topics kept after ranking.
top_k_topics = 10
# Below this many items the batch becomes a single topic.
min_items_to_cluster = 30
global_random_seed = 42
dedupe_strategy = "url_then_hash"
# Threads per dedup phase; 1 runs sequentially.
dedupe_shards = 1
# "drop" removes unclustered items from the output, "keep" retains them.
noise_handling = "drop"
# "daily" or "hourly"
bucket_interval = "daily"
output_dir = "out"

watchlist_keywords = ["tariff", "semiconductor"]
watchlist_tickers = ["TSM", "NVDA"]

[[feeds]]
name = "Reuters Business"
url = "https://www.reuters.com/business/rss"
weight = 1.0
category = "business"
market = "global"
language = "en"

[[feeds]]
name = "Focus Taiwan"
url = "https://focustaiwan.tw/rss"
weight = 0.8
market = "tw"

[clustering]
min_cluster_size = 5
top_n_words = 15

[storage]
# "file" or "memory"
mode = "file"
base_dir = "memory"

[domains]
extra_suffixes = []
"#;
