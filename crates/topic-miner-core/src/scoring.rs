//! Narrative signal scoring.
//!
//! Each topic gets four sub-scores in `[0, 100]` and a weighted final score:
//!
//! | Component | Formula | Weight |
//! |-----------|---------|--------|
//! | volume | `20·log10(volume + 1) + 20` | 0.25 |
//! | velocity | `100·exp(-hours_since_last_seen / 24)` | 0.35 |
//! | source | `min(avg_weight·60, 60) + diversity` | 0.30 |
//! | watchlist | `80` on any hit, else `0` | 0.10 |
//!
//! `diversity = clamp(15·log10(unique_domains) + 15, 0, 40)` when a topic has
//! more than one publisher, otherwise 0. The final score is clamped to
//! `[0, 100]` and rounded half-to-even to two decimals. This is a
//! preliminary signal for the Gate, not its final score.
//!
//! The reference instant is passed in so scores are reproducible.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::models::Topic;

/// Bonus awarded when a topic touches the watchlist.
pub const WATCHLIST_BONUS: f64 = 80.0;

const VOLUME_WEIGHT: f64 = 0.25;
const VELOCITY_WEIGHT: f64 = 0.35;
const SOURCE_WEIGHT: f64 = 0.30;
const WATCHLIST_WEIGHT: f64 = 0.10;

/// Sub-scores recorded under `json_payload.score_breakdown`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub volume_score: f64,
    pub velocity_score: f64,
    pub source_score: f64,
    pub watchlist_bonus: f64,
}

impl ScoreBreakdown {
    /// Weighted combination, clamped and rounded to two decimals with ties
    /// to even (`46.125` becomes `46.12`).
    pub fn final_score(&self) -> f64 {
        let raw = self.volume_score * VOLUME_WEIGHT
            + self.velocity_score * VELOCITY_WEIGHT
            + self.source_score * SOURCE_WEIGHT
            + self.watchlist_bonus * WATCHLIST_WEIGHT;
        (raw.clamp(0.0, 100.0) * 100.0).round_ties_even() / 100.0
    }

    pub fn to_json(&self) -> Value {
        json!({
            "volume_score": self.volume_score,
            "velocity_score": self.velocity_score,
            "source_score": self.source_score,
            "watchlist_bonus": self.watchlist_bonus,
        })
    }
}

/// Lower-cased union of watched keywords and ticker symbols.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    terms: HashSet<String>,
}

impl Watchlist {
    pub fn new<S: AsRef<str>>(keywords: &[S], tickers: &[S]) -> Self {
        let terms = keywords
            .iter()
            .chain(tickers.iter())
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// True when a topic keyword is a watched term, or a watched term occurs
    /// inside a representative title.
    pub fn matches(&self, topic: &Topic) -> bool {
        let keyword_hit = topic
            .top_keywords
            .iter()
            .any(|kw| self.terms.contains(&kw.to_lowercase()));
        let title_hit = topic.representative_items.iter().any(|rep| {
            let title = rep.title.to_lowercase();
            self.terms.iter().any(|term| title.contains(term.as_str()))
        });
        keyword_hit || title_hit
    }
}

/// Score every topic in place and record the breakdown on its payload.
pub fn score_topics(topics: &mut [Topic], watchlist: &Watchlist, now: DateTime<Utc>) {
    for topic in topics.iter_mut() {
        let breakdown = ScoreBreakdown {
            volume_score: volume_score(topic.topic_volume),
            velocity_score: velocity_score(topic.last_seen_at, now),
            source_score: source_score(topic.avg_source_weight, topic.unique_domains),
            watchlist_bonus: watchlist_bonus(topic, watchlist),
        };
        let score = breakdown.final_score();
        debug!(
            topic_id = topic.topic_id,
            score,
            vol = breakdown.volume_score,
            vel = breakdown.velocity_score,
            src = breakdown.source_score,
            wl = breakdown.watchlist_bonus,
            "scored topic"
        );

        topic.narrative_signal_score = Some(score);
        topic
            .json_payload
            .insert("score_breakdown".to_string(), breakdown.to_json());
    }
}

/// Log-scaled article count. 10 articles ≈ 41, 50 ≈ 54, 200 ≈ 66.
pub fn volume_score(volume: usize) -> f64 {
    if volume == 0 {
        return 0.0;
    }
    (20.0 * ((volume + 1) as f64).log10() + 20.0).clamp(0.0, 100.0)
}

/// Exponential decay on the age of the newest article: 100 now, ~37 after a
/// day, ~0.1 after a week. Future timestamps clamp to 100.
pub fn velocity_score(last_seen_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last_seen) = last_seen_at else {
        return 0.0;
    };
    let hours_ago = (now - last_seen).num_milliseconds() as f64 / 3_600_000.0;
    (100.0 * (-hours_ago / 24.0).exp()).clamp(0.0, 100.0)
}

/// Source quality (up to 60) plus publisher diversity (up to 40).
pub fn source_score(avg_source_weight: f64, unique_domains: usize) -> f64 {
    let weight_score = (avg_source_weight * 60.0).clamp(0.0, 60.0);
    let diversity_score = if unique_domains > 1 {
        (15.0 * (unique_domains as f64).log10() + 15.0).clamp(0.0, 40.0)
    } else {
        0.0
    };
    (weight_score + diversity_score).clamp(0.0, 100.0)
}

/// Binary bonus: [`WATCHLIST_BONUS`] on any hit, 0 otherwise.
pub fn watchlist_bonus(topic: &Topic, watchlist: &Watchlist) -> f64 {
    if !watchlist.is_empty() && watchlist.matches(topic) {
        WATCHLIST_BONUS
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepresentativeItem;
    use chrono::{Duration, TimeZone};
    use serde_json::Map;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 13, 12, 0, 0).unwrap()
    }

    fn make_topic(
        volume: usize,
        domains: usize,
        weight: f64,
        last_seen: Option<DateTime<Utc>>,
    ) -> Topic {
        Topic {
            run_id: "run".to_string(),
            topic_id: 0,
            topic_signature: "sig".to_string(),
            top_keywords: vec!["chips".to_string(), "Export".to_string()],
            topic_volume: volume,
            unique_domains: domains,
            avg_source_weight: weight,
            duplicate_ratio: 0.0,
            counts_by_bucket: Vec::new(),
            first_seen_at: last_seen,
            last_seen_at: last_seen,
            representative_items: vec![RepresentativeItem {
                url: "https://example.com/a".to_string(),
                title: "TSMC lifts guidance on AI demand".to_string(),
                domain: "example.com".to_string(),
                published_at: now(),
                summary: String::new(),
            }],
            narrative_signal_score: None,
            json_payload: Map::new(),
        }
    }

    fn in_range(x: f64) -> bool {
        (0.0..=100.0).contains(&x)
    }

    #[test]
    fn test_volume_score() {
        assert_eq!(volume_score(0), 0.0);
        assert!((volume_score(9) - 40.0).abs() < 1e-9);
        assert!((volume_score(99) - 60.0).abs() < 1e-9);
        assert_eq!(volume_score(usize::MAX / 2), 100.0);
    }

    #[test]
    fn test_velocity_score() {
        assert_eq!(velocity_score(None, now()), 0.0);
        assert!((velocity_score(Some(now()), now()) - 100.0).abs() < 1e-9);
        let day_old = velocity_score(Some(now() - Duration::hours(24)), now());
        assert!((day_old - 100.0 * (-1.0f64).exp()).abs() < 1e-9);
        assert_eq!(velocity_score(Some(now() + Duration::hours(5)), now()), 100.0);
    }

    #[test]
    fn test_source_score() {
        assert!((source_score(1.0, 1) - 60.0).abs() < 1e-9);
        assert!((source_score(0.5, 10) - (30.0 + 30.0)).abs() < 1e-9);
        assert!((source_score(2.0, 1000) - 100.0).abs() < 1e-9);
        assert_eq!(source_score(-1.0, 0), 0.0);
    }

    #[test]
    fn test_watchlist_empty_gives_zero() {
        let topic = make_topic(5, 2, 1.0, Some(now()));
        assert_eq!(watchlist_bonus(&topic, &Watchlist::default()), 0.0);
    }

    #[test]
    fn test_watchlist_keyword_hit_is_case_insensitive() {
        let topic = make_topic(5, 2, 1.0, Some(now()));
        let watchlist = Watchlist::new(&["EXPORT"], &[]);
        assert_eq!(watchlist_bonus(&topic, &watchlist), WATCHLIST_BONUS);
    }

    #[test]
    fn test_watchlist_title_substring_hit() {
        let topic = make_topic(5, 2, 1.0, Some(now()));
        let watchlist = Watchlist::new(&[] as &[&str], &["tsmc"]);
        assert_eq!(watchlist_bonus(&topic, &watchlist), WATCHLIST_BONUS);
    }

    #[test]
    fn test_watchlist_is_binary() {
        let topic = make_topic(5, 2, 1.0, Some(now()));
        let many = Watchlist::new(&["chips", "export", "tsmc", "ai"], &["TSM"]);
        let miss = Watchlist::new(&["oil"], &["XOM"]);
        assert_eq!(watchlist_bonus(&topic, &many), WATCHLIST_BONUS);
        assert_eq!(watchlist_bonus(&topic, &miss), 0.0);
    }

    #[test]
    fn test_score_topics_records_breakdown() {
        let mut topics = vec![make_topic(9, 1, 1.0, Some(now()))];
        score_topics(&mut topics, &Watchlist::default(), now());
        // 40*0.25 + 100*0.35 + 60*0.30 + 0
        assert_eq!(topics[0].narrative_signal_score, Some(63.0));
        let breakdown: ScoreBreakdown =
            serde_json::from_value(topics[0].json_payload["score_breakdown"].clone()).unwrap();
        assert!((breakdown.volume_score - 40.0).abs() < 1e-9);
        assert_eq!(breakdown.watchlist_bonus, 0.0);
    }

    #[test]
    fn test_final_score_rounds_to_two_decimals() {
        let breakdown = ScoreBreakdown {
            volume_score: 41.234567,
            velocity_score: 12.345678,
            source_score: 33.333333,
            watchlist_bonus: 0.0,
        };
        let score = breakdown.final_score();
        assert_eq!(score, (score * 100.0).round_ties_even() / 100.0);
        assert!((score - 24.63).abs() < 1e-9);
    }

    #[test]
    fn test_final_score_rounds_half_to_even() {
        // 40*0.25 + 100*0.35 + 3.75*0.30 is exactly 46.125
        let breakdown = ScoreBreakdown {
            volume_score: 40.0,
            velocity_score: 100.0,
            source_score: 3.75,
            watchlist_bonus: 0.0,
        };
        assert_eq!(breakdown.final_score(), 46.12);
    }

    #[test]
    fn test_low_weight_topic_score_rounds_half_to_even() {
        // volume 9 -> 40, fresh -> 100, weight 0.0625 on one domain -> 3.75
        let mut topics = vec![make_topic(9, 1, 0.0625, Some(now()))];
        score_topics(&mut topics, &Watchlist::default(), now());
        assert_eq!(topics[0].narrative_signal_score, Some(46.12));
    }

    #[test]
    fn test_score_bounds_on_edge_inputs() {
        let watchlist = Watchlist::new(&["chips"], &[]);
        let mut topics = vec![
            make_topic(0, 0, 0.0, None),
            make_topic(0, 1, 1.0, None),
            make_topic(1, 1, 1.0, Some(now() - Duration::days(365))),
            make_topic(100_000, 5_000, 5.0, Some(now() + Duration::days(1))),
            make_topic(3, 2, -4.0, Some(now())),
        ];
        score_topics(&mut topics, &watchlist, now());
        for topic in &topics {
            let breakdown: ScoreBreakdown =
                serde_json::from_value(topic.json_payload["score_breakdown"].clone()).unwrap();
            assert!(in_range(breakdown.volume_score));
            assert!(in_range(breakdown.velocity_score));
            assert!(in_range(breakdown.source_score));
            assert!(breakdown.watchlist_bonus == 0.0 || breakdown.watchlist_bonus == 80.0);
            assert!(in_range(topic.narrative_signal_score.unwrap()));
        }
    }
}
