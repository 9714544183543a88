//! Ranking and top-K selection of scored topics.

use std::cmp::Ordering;

use crate::models::Topic;

/// Sort topics by score, highest first. Unscored topics rank as 0; ties fall
/// back to larger volume, then lower topic id.
pub fn rank_topics(topics: &mut [Topic]) {
    topics.sort_by(compare_ranked);
}

/// Rank `topics` and keep the first `k`.
pub fn top_k(mut topics: Vec<Topic>, k: usize) -> Vec<Topic> {
    rank_topics(&mut topics);
    topics.truncate(k);
    topics
}

fn compare_ranked(a: &Topic, b: &Topic) -> Ordering {
    let score_a = a.narrative_signal_score.unwrap_or(0.0);
    let score_b = b.narrative_signal_score.unwrap_or(0.0);
    score_b
        .total_cmp(&score_a)
        .then_with(|| b.topic_volume.cmp(&a.topic_volume))
        .then_with(|| a.topic_id.cmp(&b.topic_id))
}
