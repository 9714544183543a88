//! Filesystem [`RunStore`].
//!
//! Layout under `base_dir`:
//!
//! ```text
//! runs/<run_id>.json      run metadata (pretty JSON)
//! items/<run_id>.jsonl    one item per line
//! topics/<run_id>.json    JSON array of topics
//! ```
//!
//! Saving replaces the previous file for that run. Empty item or topic lists
//! write nothing; missing files load as empty.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use topic_miner_core::models::{Item, RunMetadata, Topic};
use topic_miner_core::store::RunStore;

use crate::output::to_jsonl;

pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open the store, creating its directories.
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            base_dir: base_dir.into(),
        };
        for dir in [store.runs_dir(), store.items_dir(), store.topics_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        }
        debug!(base_dir = %store.base_dir.display(), "file store opened");
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn runs_dir(&self) -> PathBuf {
        self.base_dir.join("runs")
    }

    fn items_dir(&self) -> PathBuf {
        self.base_dir.join("items")
    }

    fn topics_dir(&self) -> PathBuf {
        self.base_dir.join("topics")
    }

    /// Ids of all stored runs, sorted (run ids sort chronologically).
    pub async fn list_runs(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut dir = tokio::fs::read_dir(self.runs_dir()).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Read a file, mapping "not found" to `None`.
async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Group records by run id, preserving their relative order.
fn by_run<'a, T>(records: &'a [T], run_id: impl Fn(&T) -> &str) -> BTreeMap<String, Vec<&'a T>> {
    let mut grouped: BTreeMap<String, Vec<&T>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(run_id(record).to_string())
            .or_default()
            .push(record);
    }
    grouped
}

#[async_trait]
impl RunStore for FileStore {
    async fn save_run(&self, run: &RunMetadata) -> Result<()> {
        let path = self.runs_dir().join(format!("{}.json", run.run_id));
        let json = serde_json::to_string_pretty(run)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(run_id = %run.run_id, path = %path.display(), "saved run metadata");
        Ok(())
    }

    async fn save_items(&self, items: &[Item]) -> Result<()> {
        for (run_id, group) in by_run(items, |i| i.run_id.as_str()) {
            let path = self.items_dir().join(format!("{}.jsonl", run_id));
            tokio::fs::write(&path, to_jsonl(&group)?)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(run_id = %run_id, count = group.len(), "saved items");
        }
        Ok(())
    }

    async fn save_topics(&self, topics: &[Topic]) -> Result<()> {
        for (run_id, group) in by_run(topics, |t| t.run_id.as_str()) {
            let path = self.topics_dir().join(format!("{}.json", run_id));
            let json = serde_json::to_string_pretty(&group)?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(run_id = %run_id, count = group.len(), "saved topics");
        }
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunMetadata>> {
        let path = self.runs_dir().join(format!("{}.json", run_id));
        match read_optional(&path).await? {
            Some(content) => {
                let run = serde_json::from_str(&content)
                    .with_context(|| format!("Corrupt run metadata: {}", path.display()))?;
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    async fn load_items(&self, run_id: &str) -> Result<Vec<Item>> {
        let path = self.items_dir().join(format!("{}.jsonl", run_id));
        let Some(content) = read_optional(&path).await? else {
            return Ok(Vec::new());
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(idx, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("Corrupt item on line {} of {}", idx + 1, path.display())
                })
            })
            .collect()
    }

    async fn load_topics(&self, run_id: &str) -> Result<Vec<Topic>> {
        let path = self.topics_dir().join(format!("{}.json", run_id));
        match read_optional(&path).await? {
            Some(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupt topics file: {}", path.display())),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;
    use tempfile::TempDir;
    use topic_miner_core::models::{RunStatus, SourceItem};

    fn make_item(run_id: &str, n: usize) -> Item {
        let ts = Utc.with_ymd_and_hms(2026, 2, 13, 9, 0, 0).unwrap();
        Item::from_source(
            run_id,
            SourceItem {
                source_name: "Wire".to_string(),
                source_weight: 0.9,
                canonical_url: format!("https://example.com/{}", n),
                publisher_domain: "example.com".to_string(),
                title: format!("台股 story {}", n),
                summary: Some("summary".to_string()),
                published_at: ts,
                fetched_at: ts,
                payload: Map::new(),
            },
        )
    }

    fn make_topic(run_id: &str, topic_id: i64) -> Topic {
        Topic {
            run_id: run_id.to_string(),
            topic_id,
            topic_signature: "sig".to_string(),
            top_keywords: vec!["story".to_string()],
            topic_volume: 2,
            unique_domains: 1,
            avg_source_weight: 0.9,
            duplicate_ratio: 0.0,
            counts_by_bucket: Vec::new(),
            first_seen_at: None,
            last_seen_at: None,
            representative_items: Vec::new(),
            narrative_signal_score: None,
            json_payload: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("memory")).await.unwrap();
        for dir in ["runs", "items", "topics"] {
            assert!(store.base_dir().join(dir).is_dir());
        }
    }

    #[tokio::test]
    async fn test_run_metadata_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let mut run = RunMetadata::new("run_20260213_120000_abcd1234", Utc::now(), 7, "h".into());
        run.fail("boom");
        store.save_run(&run).await.unwrap();

        let loaded = store.load_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.stats["error"], "boom");
        assert!(store.load_run("run_missing").await.unwrap().is_none());
        assert_eq!(store.list_runs().await.unwrap(), vec![run.run_id.clone()]);
    }

    #[tokio::test]
    async fn test_items_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let items = vec![make_item("run_a", 1), make_item("run_a", 2)];
        store.save_items(&items).await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("items/run_a.jsonl")).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.contains("台股"));
        assert_eq!(store.load_items("run_a").await.unwrap(), items);
    }

    #[tokio::test]
    async fn test_topics_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let topics = vec![make_topic("run_a", 0), make_topic("run_a", 3)];
        store.save_topics(&topics).await.unwrap();
        assert_eq!(store.load_topics("run_a").await.unwrap(), topics);
    }

    #[tokio::test]
    async fn test_empty_lists_write_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        store.save_items(&[]).await.unwrap();
        store.save_topics(&[]).await.unwrap();
        assert_eq!(std::fs::read_dir(tmp.path().join("items")).unwrap().count(), 0);
        assert!(store.load_items("run_a").await.unwrap().is_empty());
        assert!(store.load_topics("run_a").await.unwrap().is_empty());
    }
}
