//! Clustering collaborator boundary.
//!
//! The pipeline only needs one integer label per item ([`NOISE_TOPIC`] for
//! noise) and a ranked keyword list per label. Anything that can produce
//! those implements [`Clusterer`]. [`assign_clusters`] owns the parts of the
//! contract that belong to the pipeline: the degraded single-topic mode for
//! small batches, the label count check, stats and the noise policy.
//!
//! [`TermClusterer`] is the built-in implementation: a deterministic grouping
//! of documents by their most widely shared term.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{ClusterStats, Item, NOISE_TOPIC};

/// What to do with items the clusterer labels as noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseHandling {
    /// Remove noise items from the run output.
    Drop,
    /// Keep noise items in the item output (they never form a topic).
    Keep,
}

impl NoiseHandling {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoiseHandling::Drop => "drop",
            NoiseHandling::Keep => "keep",
        }
    }
}

impl FromStr for NoiseHandling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "drop" => Ok(NoiseHandling::Drop),
            "keep" => Ok(NoiseHandling::Keep),
            other => Err(Error::UnsupportedNoiseHandling(other.to_string())),
        }
    }
}

impl fmt::Display for NoiseHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A topic model over short texts.
pub trait Clusterer: Send + Sync {
    /// One label per text, in order. [`NOISE_TOPIC`] marks noise.
    fn assign(&self, texts: &[String], seed: u64) -> Result<Vec<i64>>;

    /// Ranked keywords for every non-noise label in `labels`.
    fn keywords(&self, texts: &[String], labels: &[i64]) -> BTreeMap<i64, Vec<String>>;
}

/// Labelled items plus what the aggregation step needs from clustering.
#[derive(Debug)]
pub struct ClusterOutput {
    pub items: Vec<Item>,
    pub keywords: BTreeMap<i64, Vec<String>>,
    pub stats: ClusterStats,
}

/// Label `items` and apply the noise policy.
///
/// Batches smaller than `min_items` are not clustered: every item joins the
/// synthetic topic `0`. That is an expected outcome, reported through
/// [`ClusterStats::degraded`], not an error.
pub fn assign_clusters(
    mut items: Vec<Item>,
    clusterer: &dyn Clusterer,
    min_items: usize,
    noise_handling: NoiseHandling,
    seed: u64,
) -> Result<ClusterOutput> {
    let texts: Vec<String> = items.iter().map(Item::cluster_text).collect();
    let mut stats = ClusterStats {
        n_items: items.len(),
        ..ClusterStats::default()
    };

    if items.len() < min_items {
        warn!(
            items = items.len(),
            min_items, "batch below clustering minimum, degrading to a single topic"
        );
        for item in items.iter_mut() {
            item.topic_id = 0;
        }
        let labels = vec![0; items.len()];
        stats.n_topics = 1;
        stats.degraded = true;
        return Ok(ClusterOutput {
            keywords: clusterer.keywords(&texts, &labels),
            items,
            stats,
        });
    }

    let labels = clusterer.assign(&texts, seed)?;
    if labels.len() != items.len() {
        return Err(Error::ClusterLabelMismatch {
            expected: items.len(),
            actual: labels.len(),
        });
    }
    for (item, label) in items.iter_mut().zip(labels.iter()) {
        item.topic_id = *label;
    }

    let distinct: BTreeSet<i64> = labels.iter().copied().filter(|l| *l != NOISE_TOPIC).collect();
    stats.n_topics = distinct.len();
    stats.noise_count = labels.iter().filter(|l| **l == NOISE_TOPIC).count();
    stats.noise_ratio = if items.is_empty() {
        0.0
    } else {
        stats.noise_count as f64 / items.len() as f64
    };
    info!(
        topics = stats.n_topics,
        noise = stats.noise_count,
        noise_ratio = stats.noise_ratio,
        "clustering complete"
    );

    let keywords = clusterer.keywords(&texts, &labels);

    if noise_handling == NoiseHandling::Drop {
        items.retain(|item| !item.is_noise());
        info!(dropped = stats.noise_count, "dropped noise items");
    }

    Ok(ClusterOutput {
        items,
        keywords,
        stats,
    })
}

/// Terms too common in news copy to say anything about a story.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "against", "all", "also", "amid", "and", "any", "are", "because",
    "been", "before", "being", "between", "both", "but", "can", "could", "did", "does", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "her", "here", "him",
    "his", "how", "into", "its", "just", "may", "more", "most", "new", "not", "now", "off", "once",
    "only", "other", "our", "out", "over", "own", "per", "said", "same", "says", "she", "should",
    "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "those", "through", "under", "until", "very", "via", "was", "were", "what", "when",
    "where", "which", "while", "who", "why", "will", "with", "would", "year", "you", "your",
];

/// Minimum token length considered by [`TermClusterer`].
const MIN_TERM_CHARS: usize = 3;

/// Groups documents by their most widely shared term.
///
/// 1. Tokenize each text into its set of lower-cased alphanumeric terms
///    (at least three characters, stopwords removed).
/// 2. Terms found in at least `min_cluster_size` documents are candidate
///    anchors.
/// 3. Each document joins the candidate anchor with the highest document
///    frequency (ties: lexicographically smallest term); documents without a
///    candidate are noise.
/// 4. Groups smaller than `min_cluster_size` dissolve into noise; the rest are
///    numbered by descending size, then anchor term.
///
/// The output depends only on the texts, so the seed is ignored.
#[derive(Debug, Clone)]
pub struct TermClusterer {
    pub min_cluster_size: usize,
    pub top_n_words: usize,
}

impl TermClusterer {
    pub fn new(min_cluster_size: usize, top_n_words: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(1),
            top_n_words,
        }
    }
}

/// Distinct terms of `text`, sorted.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

impl Clusterer for TermClusterer {
    fn assign(&self, texts: &[String], _seed: u64) -> Result<Vec<i64>> {
        let docs: Vec<BTreeSet<String>> = texts.iter().map(|t| tokenize(t)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        // BTreeSet iteration is ascending, so `>` keeps the smallest term on ties.
        let anchors: Vec<Option<&str>> = docs
            .iter()
            .map(|doc| {
                let mut best: Option<(&str, usize)> = None;
                for term in doc {
                    let freq = df[term.as_str()];
                    if freq < self.min_cluster_size {
                        continue;
                    }
                    if best.map_or(true, |(_, f)| freq > f) {
                        best = Some((term.as_str(), freq));
                    }
                }
                best.map(|(term, _)| term)
            })
            .collect();

        let mut sizes: HashMap<&str, usize> = HashMap::new();
        for anchor in anchors.iter().flatten() {
            *sizes.entry(anchor).or_insert(0) += 1;
        }
        let mut kept: Vec<(&str, usize)> = sizes
            .into_iter()
            .filter(|(_, size)| *size >= self.min_cluster_size)
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let label_of: HashMap<&str, i64> = kept
            .iter()
            .enumerate()
            .map(|(label, (term, _))| (*term, label as i64))
            .collect();

        Ok(anchors
            .iter()
            .map(|anchor| {
                anchor
                    .and_then(|term| label_of.get(term).copied())
                    .unwrap_or(NOISE_TOPIC)
            })
            .collect())
    }

    fn keywords(&self, texts: &[String], labels: &[i64]) -> BTreeMap<i64, Vec<String>> {
        let mut counts: BTreeMap<i64, HashMap<String, usize>> = BTreeMap::new();
        for (text, label) in texts.iter().zip(labels.iter()) {
            if *label == NOISE_TOPIC {
                continue;
            }
            let terms = counts.entry(*label).or_default();
            for term in tokenize(text) {
                *terms.entry(term).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .map(|(label, terms)| {
                let mut ranked: Vec<(String, usize)> = terms.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let words = ranked
                    .into_iter()
                    .take(self.top_n_words)
                    .map(|(term, _)| term)
                    .collect();
                (label, words)
            })
            .collect()
    }
}
