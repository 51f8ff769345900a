use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::attempt::{AttemptResult, QuestionResponse, TestAttempt},
};

/// Store for exam attempts. All mutual exclusion lives here: the uniqueness
/// invariant on the (user, series, test) triple and the conditional updates
/// that make response upserts and finalization race-safe. No in-process locks
/// guard attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Insert a fresh attempt. A concurrent duplicate for the same non-admin
    /// triple fails with `Conflict` rather than corrupting state.
    async fn insert_new(&self, attempt: TestAttempt) -> AppResult<TestAttempt>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<TestAttempt>>;

    /// The at-most-one non-admin attempt for a (user, series, test) triple.
    async fn find_by_triple(
        &self,
        user_id: &str,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<Option<TestAttempt>>;

    /// The caller's currently running attempt for a (user, series, test)
    /// triple, admin or not. Admins may have many finished preview attempts
    /// but at most one is answered at a time.
    async fn find_in_progress_by_triple(
        &self,
        user_id: &str,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<Option<TestAttempt>>;

    /// First half of the response upsert: append the response only if no
    /// entry exists yet for its question and the attempt is still in
    /// progress. Returns whether the write applied.
    async fn push_response_if_absent(
        &self,
        attempt_id: &str,
        response: &QuestionResponse,
    ) -> AppResult<bool>;

    /// Second half: overwrite the existing entry for the question in place,
    /// still conditioned on the attempt being in progress. Returns whether
    /// the write applied.
    async fn update_response_in_place(
        &self,
        attempt_id: &str,
        response: &QuestionResponse,
    ) -> AppResult<bool>;

    /// The CAS at the heart of exactly-once finalization: transition to
    /// SUBMITTED and set `submitted_at`, only if the status is still
    /// IN_PROGRESS. Returns the updated attempt when this caller won the
    /// transition, `None` when someone else already finalized.
    async fn finalize_if_in_progress(
        &self,
        attempt_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<Option<TestAttempt>>;

    /// Persist the frozen result fields computed at finalization.
    async fn set_result(&self, attempt_id: &str, result: &AttemptResult) -> AppResult<()>;

    /// Asynchronous rank backfill from the ranking engine.
    async fn set_rank(&self, test_id: &str, user_id: &str, rank: u32) -> AppResult<()>;

    async fn count_in_progress(&self) -> AppResult<u64>;

    async fn find_in_progress(&self) -> AppResult<Vec<TestAttempt>>;

    async fn find_submitted_by_user(&self, user_id: &str) -> AppResult<Vec<TestAttempt>>;
}

pub struct MongoAttemptRepository {
    collection: Collection<TestAttempt>,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

impl MongoAttemptRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.attempts(),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for test_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        // One attempt per (user, series, test); admin preview attempts are
        // exempt via the partial filter.
        let triple_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "series_id": 1, "test_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "is_admin_attempt": false })
                    .name("user_series_test_unique".to_string())
                    .build(),
            )
            .build();

        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1 })
            .options(IndexOptions::builder().name("status".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(triple_index).await?;
        self.collection.create_index(status_index).await?;

        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn insert_new(&self, attempt: TestAttempt) -> AppResult<TestAttempt> {
        match self.collection.insert_one(&attempt).await {
            Ok(_) => Ok(attempt),
            Err(err) if is_duplicate_key(&err) => Err(AppError::Conflict(
                "Test already started".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<TestAttempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn find_by_triple(
        &self,
        user_id: &str,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<Option<TestAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "user_id": user_id,
                "series_id": series_id,
                "test_id": test_id,
                "is_admin_attempt": false,
            })
            .await?;
        Ok(attempt)
    }

    async fn find_in_progress_by_triple(
        &self,
        user_id: &str,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<Option<TestAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "user_id": user_id,
                "series_id": series_id,
                "test_id": test_id,
                "status": "IN_PROGRESS",
            })
            .await?;
        Ok(attempt)
    }

    async fn push_response_if_absent(
        &self,
        attempt_id: &str,
        response: &QuestionResponse,
    ) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! {
                    "id": attempt_id,
                    "status": "IN_PROGRESS",
                    "responses.question_id": { "$ne": &response.question_id },
                },
                doc! { "$push": { "responses": to_bson(response)? } },
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    async fn update_response_in_place(
        &self,
        attempt_id: &str,
        response: &QuestionResponse,
    ) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! {
                    "id": attempt_id,
                    "status": "IN_PROGRESS",
                    "responses.question_id": &response.question_id,
                },
                doc! {
                    "$set": {
                        "responses.$[elem].selected_option": to_bson(&response.selected_option)?,
                        "responses.$[elem].is_correct": to_bson(&response.is_correct)?,
                        "responses.$[elem].attempted": response.attempted,
                        "responses.$[elem].visited": true,
                        "responses.$[elem].marked_for_review": response.marked_for_review,
                        "responses.$[elem].time_taken": response.time_taken,
                    }
                },
            )
            .array_filters(vec![doc! { "elem.question_id": &response.question_id }])
            .await?;

        Ok(result.matched_count == 1)
    }

    async fn finalize_if_in_progress(
        &self,
        attempt_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> AppResult<Option<TestAttempt>> {
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "id": attempt_id, "status": "IN_PROGRESS" },
                doc! {
                    "$set": {
                        "status": "SUBMITTED",
                        "submitted_at": to_bson(&submitted_at)?,
                    }
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated)
    }

    async fn set_result(&self, attempt_id: &str, result: &AttemptResult) -> AppResult<()> {
        self.collection
            .update_one(
                doc! { "id": attempt_id },
                doc! { "$set": { "result": to_bson(result)? } },
            )
            .await?;
        Ok(())
    }

    async fn set_rank(&self, test_id: &str, user_id: &str, rank: u32) -> AppResult<()> {
        self.collection
            .update_one(
                doc! {
                    "test_id": test_id,
                    "user_id": user_id,
                    "is_admin_attempt": false,
                },
                doc! { "$set": { "rank": rank } },
            )
            .await?;
        Ok(())
    }

    async fn count_in_progress(&self) -> AppResult<u64> {
        let count = self
            .collection
            .count_documents(doc! { "status": "IN_PROGRESS" })
            .await?;
        Ok(count)
    }

    async fn find_in_progress(&self) -> AppResult<Vec<TestAttempt>> {
        let attempts = self
            .collection
            .find(doc! { "status": "IN_PROGRESS" })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }

    async fn find_submitted_by_user(&self, user_id: &str) -> AppResult<Vec<TestAttempt>> {
        let attempts = self
            .collection
            .find(doc! { "user_id": user_id, "status": "SUBMITTED" })
            .sort(doc! { "submitted_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }
}
