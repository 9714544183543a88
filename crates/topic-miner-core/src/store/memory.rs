//! In-memory [`RunStore`] for tests and ephemeral runs.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Saving items or topics for a
//! run replaces whatever that run stored before.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Item, RunMetadata, Topic};

use super::RunStore;

/// In-memory run store.
pub struct MemoryStore {
    runs: RwLock<HashMap<String, RunMetadata>>,
    items: RwLock<HashMap<String, Vec<Item>>>,
    topics: RwLock<HashMap<String, Vec<Topic>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Ids of all stored runs, sorted.
    pub fn run_ids(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().map_err(|_| poisoned("runs"))?;
        let mut ids: Vec<String> = runs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(table: &str) -> anyhow::Error {
    anyhow!("memory store lock poisoned: {}", table)
}

/// Group records by run id, preserving their relative order.
fn by_run<T: Clone>(records: &[T], run_id: impl Fn(&T) -> &str) -> HashMap<String, Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for record in records {
        grouped
            .entry(run_id(record).to_string())
            .or_default()
            .push(record.clone());
    }
    grouped
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn save_run(&self, run: &RunMetadata) -> Result<()> {
        let mut runs = self.runs.write().map_err(|_| poisoned("runs"))?;
        runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn save_items(&self, items: &[Item]) -> Result<()> {
        let grouped = by_run(items, |i| i.run_id.as_str());
        let mut stored = self.items.write().map_err(|_| poisoned("items"))?;
        stored.extend(grouped);
        Ok(())
    }

    async fn save_topics(&self, topics: &[Topic]) -> Result<()> {
        let grouped = by_run(topics, |t| t.run_id.as_str());
        let mut stored = self.topics.write().map_err(|_| poisoned("topics"))?;
        stored.extend(grouped);
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<RunMetadata>> {
        let runs = self.runs.read().map_err(|_| poisoned("runs"))?;
        Ok(runs.get(run_id).cloned())
    }

    async fn load_items(&self, run_id: &str) -> Result<Vec<Item>> {
        let items = self.items.read().map_err(|_| poisoned("items"))?;
        Ok(items.get(run_id).cloned().unwrap_or_default())
    }

    async fn load_topics(&self, run_id: &str) -> Result<Vec<Topic>> {
        let topics = self.topics.read().map_err(|_| poisoned("topics"))?;
        Ok(topics.get(run_id).cloned().unwrap_or_default())
    }
}
