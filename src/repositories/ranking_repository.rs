use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    options::{IndexOptions, ReturnDocument, UpdateOneModel, WriteModel},
    Client, Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::ranking::RankingEntry,
};

#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Insert or refresh the entry for (test, user) with a new score and
    /// accuracy. The stored rank goes stale until the next bulk rewrite;
    /// `created_at` is preserved on update so the tie-breaker reflects the
    /// first submission.
    async fn upsert_score(&self, entry: RankingEntry) -> AppResult<RankingEntry>;

    /// Every entry for a test, in no particular order; the engine imposes the
    /// total order in process.
    async fn find_by_test(&self, test_id: &str) -> AppResult<Vec<RankingEntry>>;

    /// One batch write assigning rank and total_participants to every entry.
    async fn bulk_set_ranks(&self, updates: &[(String, u32, u32)]) -> AppResult<()>;

    /// Entries ordered by their precomputed rank, for the leaderboard view.
    async fn find_by_test_ranked(&self, test_id: &str) -> AppResult<Vec<RankingEntry>>;
}

pub struct MongoRankingRepository {
    client: Client,
    collection: Collection<RankingEntry>,
}

impl MongoRankingRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            client: db.client().clone(),
            collection: db.rankings(),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for test_rankings collection");

        let test_user_index = IndexModel::builder()
            .keys(doc! { "test_id": 1, "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("test_user_unique".to_string())
                    .build(),
            )
            .build();

        let test_rank_index = IndexModel::builder()
            .keys(doc! { "test_id": 1, "rank": 1 })
            .options(
                IndexOptions::builder()
                    .name("test_rank".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(test_user_index).await?;
        self.collection.create_index(test_rank_index).await?;

        Ok(())
    }
}

#[async_trait]
impl RankingRepository for MongoRankingRepository {
    async fn upsert_score(&self, entry: RankingEntry) -> AppResult<RankingEntry> {
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "test_id": &entry.test_id, "user_id": &entry.user_id },
                doc! {
                    "$set": {
                        "series_id": &entry.series_id,
                        "user_name": &entry.user_name,
                        "score": entry.score,
                        "accuracy": entry.accuracy,
                    },
                    "$setOnInsert": {
                        "id": &entry.id,
                        "rank": 0,
                        "total_participants": 0,
                        "created_at": to_bson(&entry.created_at)?,
                    }
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        updated.ok_or_else(|| {
            AppError::InternalError("Ranking upsert returned no document".to_string())
        })
    }

    async fn find_by_test(&self, test_id: &str) -> AppResult<Vec<RankingEntry>> {
        let entries = self
            .collection
            .find(doc! { "test_id": test_id })
            .await?
            .try_collect()
            .await?;
        Ok(entries)
    }

    async fn bulk_set_ranks(&self, updates: &[(String, u32, u32)]) -> AppResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let namespace = self.collection.namespace();
        let models: Vec<WriteModel> = updates
            .iter()
            .map(|(id, rank, total)| {
                WriteModel::UpdateOne(
                    UpdateOneModel::builder()
                        .namespace(namespace.clone())
                        .filter(doc! { "id": id })
                        .update(doc! {
                            "$set": { "rank": *rank, "total_participants": *total }
                        })
                        .build(),
                )
            })
            .collect();

        self.client.bulk_write(models).await?;
        Ok(())
    }

    async fn find_by_test_ranked(&self, test_id: &str) -> AppResult<Vec<RankingEntry>> {
        let entries = self
            .collection
            .find(doc! { "test_id": test_id })
            .sort(doc! { "rank": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(entries)
    }
}
