use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One leaderboard record per (test, user). Rank and total_participants are
/// rewritten for every entry of the test on each new submission; any single
/// score can shift everyone else's rank.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RankingEntry {
    pub id: String,
    pub series_id: String,
    pub test_id: String,
    pub user_id: String,
    pub user_name: String,
    pub score: f64,
    pub accuracy: f64,
    pub rank: u32,
    pub total_participants: u32,
    /// Tie-breaker: earlier submission wins under equal score and accuracy.
    pub created_at: DateTime<Utc>,
}

impl RankingEntry {
    pub fn new(
        series_id: &str,
        test_id: &str,
        user_id: &str,
        user_name: &str,
        score: f64,
        accuracy: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            series_id: series_id.to_string(),
            test_id: test_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            score,
            accuracy,
            rank: 0,
            total_participants: 0,
            created_at: Utc::now(),
        }
    }

    /// Total order over entries: score descending, accuracy descending,
    /// creation time ascending.
    pub fn standings_order(a: &RankingEntry, b: &RankingEntry) -> Ordering {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.accuracy.partial_cmp(&a.accuracy).unwrap_or(Ordering::Equal))
            .then(a.created_at.cmp(&b.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(user: &str, score: f64, accuracy: f64) -> RankingEntry {
        RankingEntry::new("series-1", "t-1", user, user, score, accuracy)
    }

    #[test]
    fn orders_by_score_then_accuracy() {
        let mut entries = vec![
            entry("a", 10.0, 90.0),
            entry("b", 10.0, 95.0),
            entry("c", 8.0, 100.0),
        ];
        entries.sort_by(RankingEntry::standings_order);

        let order: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn earlier_submission_wins_full_tie() {
        let mut first = entry("early", 10.0, 90.0);
        let mut second = entry("late", 10.0, 90.0);
        first.created_at = Utc::now() - Duration::minutes(5);
        second.created_at = Utc::now();

        let mut entries = vec![second, first];
        entries.sort_by(RankingEntry::standings_order);
        assert_eq!(entries[0].user_id, "early");
    }
}
