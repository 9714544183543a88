//! Storage abstraction for run outputs.
//!
//! The [`RunStore`] trait is what the orchestrator persists through: run
//! metadata, the final item set and the selected topics, keyed by run id.
//! Backends: [`memory::MemoryStore`] here, and a filesystem store in the
//! application crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Item, RunMetadata, Topic};

/// Abstract persistence backend for pipeline runs.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_run`](RunStore::save_run) | Insert or replace run metadata |
/// | [`save_items`](RunStore::save_items) | Store the final items of a run |
/// | [`save_topics`](RunStore::save_topics) | Store the scored topics of a run |
/// | [`load_run`](RunStore::load_run) | Fetch run metadata by id |
/// | [`load_items`](RunStore::load_items) | Fetch the items of a run |
/// | [`load_topics`](RunStore::load_topics) | Fetch the topics of a run |
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or replace the metadata for `run.run_id`.
    async fn save_run(&self, run: &RunMetadata) -> Result<()>;

    /// Store items, grouped by their `run_id`.
    async fn save_items(&self, items: &[Item]) -> Result<()>;

    /// Store topics, grouped by their `run_id`.
    async fn save_topics(&self, topics: &[Topic]) -> Result<()>;

    async fn load_run(&self, run_id: &str) -> Result<Option<RunMetadata>>;

    /// Items of a run; empty when the run stored none.
    async fn load_items(&self, run_id: &str) -> Result<Vec<Item>>;

    /// Topics of a run; empty when the run stored none.
    async fn load_topics(&self, run_id: &str) -> Result<Vec<Topic>>;
}
