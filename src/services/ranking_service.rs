use std::sync::Arc;

use crate::{
    errors::AppResult,
    models::domain::ranking::RankingEntry,
    repositories::{AttemptRepository, RankingRepository},
};

/// Recomputes the standings of a test whenever a new score lands. A full
/// reorder of every entry per submission: O(participants), accepted for
/// correctness simplicity, and the first place to optimize if participant
/// counts grow. Ranking is advisory and eventually consistent; a leaderboard
/// read during a recompute may see a transiently stale order.
pub struct RankingService {
    rankings: Arc<dyn RankingRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl RankingService {
    pub fn new(rankings: Arc<dyn RankingRepository>, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { rankings, attempts }
    }

    /// Upsert the user's entry, reorder every entry of the test by
    /// (score desc, accuracy desc, creation asc), and persist all ranks and
    /// participant counts in one bulk write. Admin attempts never reach this
    /// call site.
    pub async fn recompute(
        &self,
        series_id: &str,
        test_id: &str,
        user_id: &str,
        user_name: &str,
        score: f64,
        accuracy: f64,
    ) -> AppResult<()> {
        self.rankings
            .upsert_score(RankingEntry::new(
                series_id, test_id, user_id, user_name, score, accuracy,
            ))
            .await?;

        let mut entries = self.rankings.find_by_test(test_id).await?;
        entries.sort_by(RankingEntry::standings_order);

        let total = entries.len() as u32;
        let updates: Vec<(String, u32, u32)> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (entry.id.clone(), index as u32 + 1, total))
            .collect();

        self.rankings.bulk_set_ranks(&updates).await?;

        // Backfill the submitting user's rank onto their attempt document.
        if let Some(position) = entries.iter().position(|e| e.user_id == user_id) {
            self.attempts
                .set_rank(test_id, user_id, position as u32 + 1)
                .await?;
        }

        Ok(())
    }

    /// Entries ordered by precomputed rank, for the leaderboard view.
    pub async fn standings(&self, test_id: &str) -> AppResult<Vec<RankingEntry>> {
        self.rankings.find_by_test_ranked(test_id).await
    }

    pub async fn entry_for_user(
        &self,
        test_id: &str,
        user_id: &str,
    ) -> AppResult<Option<RankingEntry>> {
        let entries = self.rankings.find_by_test(test_id).await?;
        Ok(entries.into_iter().find(|e| e.user_id == user_id))
    }
}
