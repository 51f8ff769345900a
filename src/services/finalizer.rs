use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::attempt::TestAttempt,
    repositories::AttemptRepository,
    services::{ranking_service::RankingService, scoring},
};

/// How many times the conditional status update is retried on transient
/// store failures. The CAS makes the retry idempotent.
const FINALIZE_RETRIES: u32 = 3;

pub struct FinalizeOutcome {
    pub attempt: TestAttempt,
    /// Whether this caller performed the transition. Exactly one caller per
    /// attempt ever observes `true`.
    pub newly_finalized: bool,
}

/// The single path through which an attempt leaves IN_PROGRESS, shared by
/// user-initiated submits and the auto-submit sweep. Both race through the
/// same store-level CAS, so at most one finalization happens.
pub struct AttemptFinalizer {
    attempts: Arc<dyn AttemptRepository>,
    ranking: Arc<RankingService>,
}

impl AttemptFinalizer {
    pub fn new(attempts: Arc<dyn AttemptRepository>, ranking: Arc<RankingService>) -> Self {
        Self { attempts, ranking }
    }

    pub async fn finalize(&self, attempt_id: &str) -> AppResult<FinalizeOutcome> {
        let submitted_at = Utc::now();

        let won_transition = self
            .finalize_with_retry(attempt_id, submitted_at)
            .await?;

        let Some(mut attempt) = won_transition else {
            // Someone else finalized first; hand back the already-final
            // result instead of erroring.
            let attempt = self
                .attempts
                .find_by_id(attempt_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Test attempt not found".to_string()))?;

            if attempt.is_in_progress() {
                return Err(AppError::InternalError(
                    "Attempt reverted to IN_PROGRESS after a lost finalization race".to_string(),
                ));
            }

            return Ok(FinalizeOutcome {
                attempt,
                newly_finalized: false,
            });
        };

        let submitted_at = attempt.submitted_at.unwrap_or(submitted_at);
        let result = scoring::compute_result(
            &attempt.snapshot,
            &attempt.responses,
            attempt.started_at,
            submitted_at,
        );

        self.attempts.set_result(&attempt.id, &result).await?;
        attempt.result = Some(result.clone());

        // Ranking lag must never block the submit response; admin preview
        // attempts do not participate.
        if !attempt.is_admin_attempt {
            let ranking = Arc::clone(&self.ranking);
            let (series_id, test_id, user_id, user_name) = (
                attempt.series_id.clone(),
                attempt.test_id.clone(),
                attempt.user_id.clone(),
                attempt.user_name.clone(),
            );
            tokio::spawn(async move {
                if let Err(err) = ranking
                    .recompute(
                        &series_id,
                        &test_id,
                        &user_id,
                        &user_name,
                        result.score,
                        result.accuracy,
                    )
                    .await
                {
                    log::error!(
                        "Ranking recompute failed for test {} user {}: {}",
                        test_id,
                        user_id,
                        err
                    );
                }
            });
        }

        Ok(FinalizeOutcome {
            attempt,
            newly_finalized: true,
        })
    }

    async fn finalize_with_retry(
        &self,
        attempt_id: &str,
        submitted_at: chrono::DateTime<Utc>,
    ) -> AppResult<Option<TestAttempt>> {
        let mut last_err = None;

        for _ in 0..FINALIZE_RETRIES {
            match self
                .attempts
                .finalize_if_in_progress(attempt_id, submitted_at)
                .await
            {
                Ok(updated) => return Ok(updated),
                Err(err) if err.is_transient() => {
                    log::warn!(
                        "Transient store error finalizing attempt {}: {}; retrying",
                        attempt_id,
                        err
                    );
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            AppError::InternalError("Finalization retries exhausted".to_string())
        }))
    }
}
