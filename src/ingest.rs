//! Ingest of the local feed export.
//!
//! The collector writes one JSON object per line:
//!
//! ```json
//! {"link": "https://...", "title": "...", "summary": "...", "published": "2026-02-13T08:00:00Z",
//!  "source_name": "Reuters Business", "source_weight": 1.0, "extra": {}}
//! ```
//!
//! Only `link`, `title` and `source_name` are required. Entries are turned
//! into unclustered [`Item`]s in file order:
//!
//! 1. At most `max_items_per_feed` entries are considered per `source_name`.
//! 2. Entries without a title or link are skipped.
//! 3. The link is canonicalized and the publisher domain extracted; entries
//!    whose link does not parse are skipped with a warning.
//! 4. A missing or unparseable `published` falls back to the fetch time.
//! 5. Entries published before `now - lookback_days` are dropped.
//! 6. An entry's own `source_weight` overrides the feed weight. Values
//!    outside `[0, 1]` are clamped with a warning.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use topic_miner_core::models::{Item, SourceItem};

use crate::config::Config;
use crate::url_normalize::{normalize_url, DomainExtractor};

/// One line of the feed export.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    /// RFC 3339 or RFC 2822 timestamp.
    #[serde(default)]
    pub published: Option<String>,
    pub source_name: String,
    #[serde(default)]
    pub source_weight: Option<f64>,
    /// Display name of the publisher, when the feed carries one.
    #[serde(default)]
    pub publisher_name: Option<String>,
    /// Free-form fields copied into the item payload.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

/// Counters reported after ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub read: usize,
    pub over_feed_cap: usize,
    pub incomplete: usize,
    pub invalid_link: usize,
    pub stale: usize,
    /// Accepted entries whose `source_weight` was clamped into `[0, 1]`.
    pub clamped_weight: usize,
    pub accepted: usize,
}

/// Parse JSON Lines content. Blank lines are skipped.
pub fn parse_entries(content: &str) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: RawEntry = serde_json::from_str(line)
            .with_context(|| format!("Malformed feed entry on line {}", idx + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

pub fn read_entries(path: &Path) -> Result<Vec<RawEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feed export: {}", path.display()))?;
    parse_entries(&content)
}

/// Parse a feed timestamp and convert it to UTC.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Turn raw entries into items for `run_id`.
///
/// `now` is both the fetch time stamped on every item and the end of the
/// lookback window.
pub fn collect_items(
    entries: Vec<RawEntry>,
    run_id: &str,
    config: &Config,
    extractor: &DomainExtractor,
    now: DateTime<Utc>,
) -> (Vec<Item>, IngestStats) {
    let lookback_start = now - Duration::days(i64::from(config.lookback_days));
    let mut per_feed: HashMap<String, usize> = HashMap::new();
    let mut stats = IngestStats::default();
    let mut items = Vec::new();

    for entry in entries {
        stats.read += 1;

        let seen = per_feed.entry(entry.source_name.clone()).or_insert(0);
        *seen += 1;
        if *seen > config.max_items_per_feed {
            stats.over_feed_cap += 1;
            continue;
        }

        let title = entry.title.trim();
        let link = entry.link.trim();
        if title.is_empty() || link.is_empty() {
            stats.incomplete += 1;
            continue;
        }

        let canonical_url = match normalize_url(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(source = %entry.source_name, link, "skipping entry: {:#}", e);
                stats.invalid_link += 1;
                continue;
            }
        };
        let Some(publisher_domain) = extractor.extract(&canonical_url) else {
            warn!(source = %entry.source_name, link, "skipping entry without a host");
            stats.invalid_link += 1;
            continue;
        };

        let published_at = match entry.published.as_deref().and_then(parse_published) {
            Some(ts) => ts,
            None => {
                debug!(link, "no usable publish time, using fetch time");
                now
            }
        };
        if published_at < lookback_start {
            stats.stale += 1;
            continue;
        }

        let feed = config.feed(&entry.source_name);
        let source_weight = match entry.source_weight {
            Some(weight) if !(0.0..=1.0).contains(&weight) => {
                warn!(
                    source = %entry.source_name,
                    link,
                    weight,
                    "clamping source_weight to [0, 1]"
                );
                stats.clamped_weight += 1;
                weight.clamp(0.0, 1.0)
            }
            Some(weight) => weight,
            None => feed.map(|f| f.weight).unwrap_or(1.0),
        };
        // -0.0 + 0.0 is +0.0; dedup orders weights with total_cmp.
        let source_weight = source_weight + 0.0;

        let mut payload = Map::new();
        payload.insert(
            "publisher_name".to_string(),
            Value::String(
                entry
                    .publisher_name
                    .clone()
                    .unwrap_or_else(|| entry.source_name.clone()),
            ),
        );
        payload.insert(
            "category".to_string(),
            feed.and_then(|f| f.category.clone())
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        payload.insert(
            "market".to_string(),
            feed.and_then(|f| f.market.clone())
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        payload.insert(
            "language".to_string(),
            Value::String(
                feed.and_then(|f| f.language.clone())
                    .unwrap_or_else(|| "en".to_string()),
            ),
        );
        payload.insert("original_link".to_string(), Value::String(link.to_string()));
        for (key, value) in entry.extra {
            payload.entry(key).or_insert(value);
        }

        items.push(Item::from_source(
            run_id,
            SourceItem {
                source_name: entry.source_name,
                source_weight,
                canonical_url,
                publisher_domain,
                title: title.to_string(),
                summary: entry.summary,
                published_at,
                fetched_at: now,
                payload,
            },
        ));
        stats.accepted += 1;
    }

    info!(
        read = stats.read,
        accepted = stats.accepted,
        stale = stats.stale,
        over_feed_cap = stats.over_feed_cap,
        incomplete = stats.incomplete,
        invalid_link = stats.invalid_link,
        clamped_weight = stats.clamped_weight,
        "ingest complete"
    );
    (items, stats)
}
