//! Run output files for the downstream Gate.
//!
//! Each run writes a directory `<output_dir>/<run_id>/` containing:
//!
//! - `topics.json`: pretty-printed JSON array of the selected topics
//! - `items.jsonl`: one compact JSON item per line
//!
//! Non-ASCII text is written verbatim (serde_json never escapes it).

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use topic_miner_core::models::{Item, Topic};

pub const TOPICS_FILE: &str = "topics.json";
pub const ITEMS_FILE: &str = "items.jsonl";

/// Paths of the files written for one run.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub topics: PathBuf,
    pub items: PathBuf,
}

/// One compact JSON object per line, newline-terminated.
pub fn to_jsonl<T: Serialize>(records: &[T]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Write `topics.json` and `items.jsonl` under `<output_dir>/<run_id>/`.
pub async fn write_run_output(
    output_dir: &Path,
    run_id: &str,
    topics: &[Topic],
    items: &[Item],
) -> Result<OutputPaths> {
    let dir = output_dir.join(run_id);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let topics_path = dir.join(TOPICS_FILE);
    let json = serde_json::to_string_pretty(topics)?;
    tokio::fs::write(&topics_path, json)
        .await
        .with_context(|| format!("Failed to write {}", topics_path.display()))?;

    let items_path = dir.join(ITEMS_FILE);
    tokio::fs::write(&items_path, to_jsonl(items)?)
        .await
        .with_context(|| format!("Failed to write {}", items_path.display()))?;

    info!(
        topics = topics.len(),
        items = items.len(),
        dir = %dir.display(),
        "wrote run output"
    );

    Ok(OutputPaths {
        dir,
        topics: topics_path,
        items: items_path,
    })
}
