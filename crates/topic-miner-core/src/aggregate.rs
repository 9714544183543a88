//! Cluster-to-topic aggregation.
//!
//! Groups labelled items into one [`Topic`] per non-noise cluster, computes
//! the per-topic statistics the Gate reads (volume, publisher spread, source
//! weight, time buckets, representative items) and derives the stable
//! [`topic_signature`](crate::hashing::topic_signature). Every member item is
//! stamped with the signature so items and topics can be joined downstream.
//!
//! Topics are emitted in ascending cluster-label order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::hashing::{self, SIGNATURE_DOMAINS, SIGNATURE_KEYWORDS};
use crate::models::{Item, RepresentativeItem, Topic, TopicBucket};

/// Keywords kept on a topic record.
pub const MAX_TOPIC_KEYWORDS: usize = 15;
/// Representative items kept on a topic record.
pub const MAX_REPRESENTATIVES: usize = 5;
/// Characters of summary kept on a representative item.
pub const REPRESENTATIVE_SUMMARY_CHARS: usize = 200;
/// Entries in the `domain_counts` payload table.
const DOMAIN_COUNT_ENTRIES: usize = 10;

/// Width of the time buckets in [`Topic::counts_by_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketInterval {
    Daily,
    Hourly,
}

impl BucketInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketInterval::Daily => "daily",
            BucketInterval::Hourly => "hourly",
        }
    }

    /// Label of the UTC bucket containing `ts`.
    ///
    /// Daily: `2026-02-13`. Hourly: `2026-02-13T10:00:00+00:00`.
    pub fn label(&self, ts: &DateTime<Utc>) -> String {
        match self {
            BucketInterval::Daily => ts.format("%Y-%m-%d").to_string(),
            BucketInterval::Hourly => ts.format("%Y-%m-%dT%H:00:00+00:00").to_string(),
        }
    }
}

impl FromStr for BucketInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(BucketInterval::Daily),
            "hourly" => Ok(BucketInterval::Hourly),
            other => Err(Error::UnsupportedBucketInterval(other.to_string())),
        }
    }
}

impl fmt::Display for BucketInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate clustered items into topics.
///
/// Items labelled noise are skipped (they stay in `items` untouched). Items
/// of every emitted topic get their `topic_signature` set.
pub fn aggregate_topics(
    items: &mut [Item],
    topic_keywords: &BTreeMap<i64, Vec<String>>,
    bucket_interval: &str,
) -> Result<Vec<Topic>> {
    let interval: BucketInterval = bucket_interval.parse()?;

    let mut groups: BTreeMap<i64, Vec<&mut Item>> = BTreeMap::new();
    for item in items.iter_mut().filter(|item| !item.is_noise()) {
        groups.entry(item.topic_id).or_default().push(item);
    }

    let mut topics = Vec::with_capacity(groups.len());
    for (topic_id, mut members) in groups {
        let keywords = topic_keywords
            .get(&topic_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        topics.push(create_topic(topic_id, &mut members, keywords, interval)?);
    }

    info!(topics = topics.len(), "aggregated topics");
    Ok(topics)
}

/// Build the topic record for one cluster and stamp its members.
///
/// `keywords` must already be ranked. An empty `members` slice is a caller
/// bug and yields [`Error::EmptyTopic`].
pub fn create_topic(
    topic_id: i64,
    members: &mut [&mut Item],
    keywords: &[String],
    interval: BucketInterval,
) -> Result<Topic> {
    if members.is_empty() {
        return Err(Error::EmptyTopic(topic_id));
    }

    let topic = {
        let view: Vec<&Item> = members.iter().map(|item| &**item).collect();
        summarize(topic_id, &view, keywords, interval)
    };

    for item in members.iter_mut() {
        item.topic_signature = topic.topic_signature.clone();
    }

    debug!(
        topic_id,
        volume = topic.topic_volume,
        signature = %topic.topic_signature,
        "created topic"
    );
    Ok(topic)
}

fn summarize(
    topic_id: i64,
    items: &[&Item],
    keywords: &[String],
    interval: BucketInterval,
) -> Topic {
    let volume = items.len();
    let domains = domain_frequencies(items);
    let top_domains: Vec<String> = domains
        .iter()
        .take(SIGNATURE_DOMAINS)
        .map(|(domain, _)| domain.clone())
        .collect();

    let avg_source_weight = items.iter().map(|i| i.source_weight).sum::<f64>() / volume as f64;

    let unique_hashes: HashSet<&str> = items.iter().map(|i| i.content_hash.as_str()).collect();
    let duplicate_ratio = 1.0 - unique_hashes.len() as f64 / volume as f64;

    let first_seen_at = items.iter().map(|i| i.published_at).min();
    let last_seen_at = items.iter().map(|i| i.published_at).max();

    let signature = hashing::topic_signature(
        &keywords[..keywords.len().min(SIGNATURE_KEYWORDS)],
        &top_domains,
    );

    let mut payload = Map::new();
    payload.insert("top_domains".to_string(), json!(top_domains));
    let domain_counts: Map<String, Value> = domains
        .iter()
        .take(DOMAIN_COUNT_ENTRIES)
        .map(|(domain, count)| (domain.clone(), json!(count)))
        .collect();
    payload.insert("domain_counts".to_string(), Value::Object(domain_counts));

    Topic {
        run_id: items[0].run_id.clone(),
        topic_id,
        topic_signature: signature,
        top_keywords: keywords.iter().take(MAX_TOPIC_KEYWORDS).cloned().collect(),
        topic_volume: volume,
        unique_domains: domains.len(),
        avg_source_weight,
        duplicate_ratio,
        counts_by_bucket: time_buckets(items, interval),
        first_seen_at,
        last_seen_at,
        representative_items: select_representatives(items, MAX_REPRESENTATIVES),
        narrative_signal_score: None,
        json_payload: payload,
    }
}

/// Publisher domains with their counts, most frequent first. Ties keep the
/// order in which the domain first appeared.
fn domain_frequencies(items: &[&Item]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for item in items {
        match index.get(item.publisher_domain.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(item.publisher_domain.as_str(), counts.len());
                counts.push((item.publisher_domain.clone(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Item counts per UTC bucket, ascending by label.
pub fn time_buckets(items: &[&Item], interval: BucketInterval) -> Vec<TopicBucket> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(interval.label(&item.published_at)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(bucket_start, count)| TopicBucket {
            bucket_start,
            count,
        })
        .collect()
}

/// Heaviest sources first, newest first within a weight.
pub fn select_representatives(items: &[&Item], n: usize) -> Vec<RepresentativeItem> {
    let mut ranked: Vec<&Item> = items.to_vec();
    ranked.sort_by(|a, b| {
        b.source_weight
            .total_cmp(&a.source_weight)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });

    ranked
        .into_iter()
        .take(n)
        .map(|item| RepresentativeItem {
            url: item.canonical_url.clone(),
            title: item.title.clone(),
            domain: item.publisher_domain.clone(),
            published_at: item.published_at,
            summary: item
                .summary
                .chars()
                .take(REPRESENTATIVE_SUMMARY_CHARS)
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, hour, 15, 30).unwrap()
    }

    fn make_item(id: &str, topic_id: i64, domain: &str, weight: f64, at: DateTime<Utc>) -> Item {
        Item {
            item_id: id.to_string(),
            run_id: "run_test".to_string(),
            canonical_url: format!("https://{}/{}", domain, id),
            publisher_domain: domain.to_string(),
            published_at: at,
            fetched_at: at,
            source_name: "Feed".to_string(),
            source_weight: weight,
            title: format!("Title {}", id),
            summary: format!("Summary {}", id),
            has_summary: true,
            text_len: 20,
            content_hash: format!("hash-{}", id),
            topic_id,
            topic_signature: String::new(),
            json_payload: Map::new(),
        }
    }

    fn keywords(topic_id: i64, words: &[&str]) -> BTreeMap<i64, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert(topic_id, words.iter().map(|w| w.to_string()).collect());
        map
    }

    #[test]
    fn test_noise_is_skipped_and_left_untouched() {
        let mut items = vec![
            make_item("a", 0, "reuters.com", 1.0, ts(1, 9)),
            make_item("b", -1, "ft.com", 1.0, ts(1, 9)),
            make_item("c", 0, "ft.com", 0.5, ts(2, 9)),
        ];
        let topics = aggregate_topics(&mut items, &keywords(0, &["rates"]), "daily").unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].topic_volume, 2);
        assert_eq!(items.len(), 3);
        assert!(items[1].topic_signature.is_empty());
        assert_eq!(items[0].topic_signature, topics[0].topic_signature);
        assert_eq!(items[2].topic_signature, topics[0].topic_signature);
    }

    #[test]
    fn test_topics_in_label_order() {
        let mut items = vec![
            make_item("a", 3, "a.com", 1.0, ts(1, 1)),
            make_item("b", 1, "b.com", 1.0, ts(1, 1)),
            make_item("c", 2, "c.com", 1.0, ts(1, 1)),
        ];
        let topics = aggregate_topics(&mut items, &BTreeMap::new(), "daily").unwrap();
        let ids: Vec<i64> = topics.iter().map(|t| t.topic_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_statistics() {
        let mut items = vec![
            make_item("a", 0, "reuters.com", 1.0, ts(1, 9)),
            make_item("b", 0, "ft.com", 0.5, ts(3, 9)),
            make_item("c", 0, "reuters.com", 0.6, ts(2, 9)),
        ];
        items[2].content_hash = items[0].content_hash.clone();
        let topics = aggregate_topics(&mut items, &BTreeMap::new(), "daily").unwrap();
        let topic = &topics[0];
        assert_eq!(topic.topic_volume, 3);
        assert_eq!(topic.unique_domains, 2);
        assert!((topic.avg_source_weight - 0.7).abs() < 1e-9);
        assert!((topic.duplicate_ratio - (1.0 - 2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(topic.first_seen_at, Some(ts(1, 9)));
        assert_eq!(topic.last_seen_at, Some(ts(3, 9)));
        assert_eq!(topic.run_id, "run_test");
        assert!(topic.narrative_signal_score.is_none());
        assert_eq!(topic.json_payload["top_domains"], json!(["reuters.com", "ft.com"]));
        assert_eq!(topic.json_payload["domain_counts"]["reuters.com"], json!(2));
    }

    #[test]
    fn test_top_domains_tie_keeps_first_seen() {
        let refs = [
            make_item("a", 0, "zeta.com", 1.0, ts(1, 1)),
            make_item("b", 0, "alpha.com", 1.0, ts(1, 1)),
            make_item("c", 0, "mid.com", 1.0, ts(1, 1)),
            make_item("d", 0, "mid.com", 1.0, ts(1, 1)),
        ];
        let view: Vec<&Item> = refs.iter().collect();
        let domains: Vec<String> = domain_frequencies(&view)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert_eq!(domains, vec!["mid.com", "zeta.com", "alpha.com"]);
    }

    #[test]
    fn test_signature_uses_ranked_prefixes() {
        let words: Vec<String> = (0..20).map(|i| format!("kw{}", i)).collect();
        let mut map = BTreeMap::new();
        map.insert(0, words.clone());
        let mut items = vec![make_item("a", 0, "reuters.com", 1.0, ts(1, 1))];
        let topics = aggregate_topics(&mut items, &map, "daily").unwrap();
        assert_eq!(
            topics[0].topic_signature,
            hashing::topic_signature(&words[..10], &["reuters.com"])
        );
        assert_eq!(topics[0].top_keywords.len(), MAX_TOPIC_KEYWORDS);
    }

    #[test]
    fn test_daily_buckets_conserve_volume() {
        let mut items: Vec<Item> = (0..9)
            .map(|i| make_item(&format!("i{}", i), 0, "a.com", 1.0, ts(1 + i % 3, i)))
            .collect();
        let topics = aggregate_topics(&mut items, &BTreeMap::new(), "daily").unwrap();
        let buckets = &topics[0].counts_by_bucket;
        let labels: Vec<&str> = buckets.iter().map(|b| b.bucket_start.as_str()).collect();
        assert_eq!(labels, vec!["2026-02-01", "2026-02-02", "2026-02-03"]);
        let total: usize = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, topics[0].topic_volume);
    }

    #[test]
    fn test_hourly_bucket_label() {
        assert_eq!(
            BucketInterval::Hourly.label(&ts(13, 10)),
            "2026-02-13T10:00:00+00:00"
        );
        let mut items = vec![
            make_item("a", 0, "a.com", 1.0, ts(13, 10)),
            make_item("b", 0, "a.com", 1.0, ts(13, 10)),
            make_item("c", 0, "a.com", 1.0, ts(13, 11)),
        ];
        let topics = aggregate_topics(&mut items, &BTreeMap::new(), "hourly").unwrap();
        assert_eq!(topics[0].counts_by_bucket.len(), 2);
        assert_eq!(topics[0].counts_by_bucket[0].count, 2);
    }

    #[test]
    fn test_unsupported_interval() {
        let mut items = vec![make_item("a", 0, "a.com", 1.0, ts(1, 1))];
        let err = aggregate_topics(&mut items, &BTreeMap::new(), "weekly").unwrap_err();
        assert!(matches!(err, Error::UnsupportedBucketInterval(_)));
    }

    #[test]
    fn test_empty_topic_is_rejected() {
        let err = create_topic(4, &mut [], &[], BucketInterval::Daily).unwrap_err();
        assert!(matches!(err, Error::EmptyTopic(4)));
    }

    #[test]
    fn test_representatives_order_and_truncation() {
        let mut items: Vec<Item> = vec![
            make_item("low", 0, "a.com", 0.2, ts(5, 1)),
            make_item("old", 0, "a.com", 0.9, ts(1, 1)),
            make_item("new", 0, "a.com", 0.9, ts(4, 1)),
            make_item("mid", 0, "a.com", 0.5, ts(2, 1)),
            make_item("x1", 0, "a.com", 0.1, ts(2, 1)),
            make_item("x2", 0, "a.com", 0.1, ts(1, 1)),
        ];
        items[2].summary = "é".repeat(300);
        let view: Vec<&Item> = items.iter().collect();
        let reps = select_representatives(&view, MAX_REPRESENTATIVES);
        let titles: Vec<&str> = reps.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Title new", "Title old", "Title mid", "Title low", "Title x1"]
        );
        assert_eq!(reps[0].summary.chars().count(), REPRESENTATIVE_SUMMARY_CHARS);
    }
}
