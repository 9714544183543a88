//! Two-phase deduplication: by canonical URL, then by content hash.
//!
//! Each phase collapses every group of items sharing a key into a single
//! winner. The winner is the maximum of the group under the total order
//!
//! ```text
//! (source_weight, published_at, Reverse(position in the phase input))
//! ```
//!
//! i.e. the heavier source wins, then the later publication, and on an exact
//! tie the item seen first is kept. Because [`pick_winner`] is a max over a
//! total order it is associative and commutative, so the sequential fold in
//! [`dedupe_items`] and the chunked map-reduce in [`dedupe_items_parallel`]
//! produce identical output.
//!
//! Survivors are emitted in the order their key was first seen.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result};
use crate::models::{DedupStats, Item};

/// Supported deduplication strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Collapse by canonical URL, then by content hash.
    UrlThenHash,
}

impl DedupStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupStrategy::UrlThenHash => "url_then_hash",
        }
    }
}

impl FromStr for DedupStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "url_then_hash" => Ok(DedupStrategy::UrlThenHash),
            other => Err(Error::UnsupportedStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order two entries of one phase input. `a` and `b` are positions in `items`.
///
/// Never returns `Equal` for distinct positions.
fn rank(items: &[Item], a: usize, b: usize) -> Ordering {
    items[a]
        .source_weight
        .total_cmp(&items[b].source_weight)
        .then_with(|| items[a].published_at.cmp(&items[b].published_at))
        .then_with(|| b.cmp(&a))
}

/// Reduce step for one key: the position of the preferred entry.
pub fn pick_winner(items: &[Item], a: usize, b: usize) -> usize {
    if rank(items, a, b) == Ordering::Less {
        b
    } else {
        a
    }
}

/// Per-key accumulator: where the key was first seen and who currently wins.
#[derive(Debug, Clone, Copy)]
struct Group {
    first_seen: usize,
    winner: usize,
}

impl Group {
    fn merge(self, other: Group, items: &[Item]) -> Group {
        Group {
            first_seen: self.first_seen.min(other.first_seen),
            winner: pick_winner(items, self.winner, other.winner),
        }
    }
}

/// Fold `range` of `items` into per-key groups.
fn fold_range<'a, F>(
    items: &'a [Item],
    range: std::ops::Range<usize>,
    key: &F,
) -> HashMap<&'a str, Group>
where
    F: Fn(&Item) -> &str,
{
    let mut groups: HashMap<&'a str, Group> = HashMap::new();
    for pos in range {
        let single = Group {
            first_seen: pos,
            winner: pos,
        };
        groups
            .entry(key(&items[pos]))
            .and_modify(|g| *g = g.merge(single, items))
            .or_insert(single);
    }
    groups
}

/// Take the winners out of `items`, ordered by first appearance of their key.
fn collect_winners(items: Vec<Item>, mut groups: Vec<Group>) -> Vec<Item> {
    groups.sort_by_key(|g| g.first_seen);
    let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
    groups
        .iter()
        .filter_map(|g| slots[g.winner].take())
        .collect()
}

/// One phase, sequential. Returns survivors and the number of key collisions.
fn collapse<F>(items: Vec<Item>, key: F) -> (Vec<Item>, usize)
where
    F: Fn(&Item) -> &str,
{
    let total = items.len();
    let groups: Vec<Group> = fold_range(&items, 0..total, &key).into_values().collect();
    let collisions = total - groups.len();
    (collect_winners(items, groups), collisions)
}

/// One phase as a map-reduce over `shards` contiguous chunks of the input.
fn collapse_sharded<F>(items: Vec<Item>, key: F, shards: usize) -> (Vec<Item>, usize)
where
    F: Fn(&Item) -> &str + Sync,
{
    let total = items.len();
    let chunk = total.div_ceil(shards.max(1)).max(1);

    let partials: Vec<HashMap<&str, Group>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..total)
            .step_by(chunk)
            .map(|start| {
                let range = start..(start + chunk).min(total);
                let items = &items;
                let key = &key;
                scope.spawn(move || fold_range(items, range, key))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut merged: HashMap<&str, Group> = HashMap::new();
    for partial in partials {
        for (k, group) in partial {
            merged
                .entry(k)
                .and_modify(|g| *g = g.merge(group, &items))
                .or_insert(group);
        }
    }
    let groups: Vec<Group> = merged.into_values().collect();
    let collisions = total - groups.len();
    (collect_winners(items, groups), collisions)
}

fn finish(original_count: usize, by_url: usize, by_hash: usize, items: &[Item]) -> DedupStats {
    let stats = DedupStats {
        original_count,
        duplicates_by_url: by_url,
        duplicates_by_hash: by_hash,
        final_count: items.len(),
    };
    info!(
        original = stats.original_count,
        by_url = stats.duplicates_by_url,
        by_hash = stats.duplicates_by_hash,
        remaining = stats.final_count,
        "dedupe complete"
    );
    stats
}

/// Deduplicate `items` with the named strategy.
///
/// Fails with [`Error::UnsupportedStrategy`] for anything other than
/// `"url_then_hash"`; there is no default.
pub fn dedupe_items(items: Vec<Item>, strategy: &str) -> Result<(Vec<Item>, DedupStats)> {
    match strategy.parse::<DedupStrategy>()? {
        DedupStrategy::UrlThenHash => {
            let original_count = items.len();

            let (by_url, url_dups) = collapse(items, |item| item.canonical_url.as_str());
            info!(remaining = by_url.len(), duplicates = url_dups, "after URL dedupe");

            let (by_hash, hash_dups) = collapse(by_url, |item| item.content_hash.as_str());
            let stats = finish(original_count, url_dups, hash_dups, &by_hash);
            Ok((by_hash, stats))
        }
    }
}

/// Same contract and output as [`dedupe_items`], with each phase split into
/// `shards` chunks reduced on scoped threads.
pub fn dedupe_items_parallel(
    items: Vec<Item>,
    strategy: &str,
    shards: usize,
) -> Result<(Vec<Item>, DedupStats)> {
    match strategy.parse::<DedupStrategy>()? {
        DedupStrategy::UrlThenHash => {
            let original_count = items.len();

            let (by_url, url_dups) =
                collapse_sharded(items, |item| item.canonical_url.as_str(), shards);
            let (by_hash, hash_dups) =
                collapse_sharded(by_url, |item| item.content_hash.as_str(), shards);
            let stats = finish(original_count, url_dups, hash_dups, &by_hash);
            Ok((by_hash, stats))
        }
    }
}
