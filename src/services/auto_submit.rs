use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::Utc;

use crate::{
    errors::AppResult,
    repositories::AttemptRepository,
    services::finalizer::AttemptFinalizer,
};

/// Guarantees every attempt is eventually finalized even when the client
/// disconnects before submitting. A single background sweep task, started on
/// the first active attempt and stopped once a sweep finds none, walks all
/// IN_PROGRESS attempts and finalizes the expired ones through the same
/// CAS-guarded path as user submits.
///
/// The in-memory counter is only a hint for starting and stopping the task;
/// every sweep reconciles it against a live store count, and
/// `reconcile_from_store` re-seeds it on boot so restarts are survived.
pub struct AutoSubmitScheduler {
    attempts: Arc<dyn AttemptRepository>,
    finalizer: Arc<AttemptFinalizer>,
    sweep_interval: Duration,
    active_tests: AtomicI64,
    sweep_running: AtomicBool,
}

impl AutoSubmitScheduler {
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        finalizer: Arc<AttemptFinalizer>,
        sweep_interval_secs: u64,
    ) -> Self {
        Self {
            attempts,
            finalizer,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
            active_tests: AtomicI64::new(0),
            sweep_running: AtomicBool::new(false),
        }
    }

    /// Called when an attempt starts. Spawns the sweep task if it is not
    /// already running.
    pub fn activate(self: &Arc<Self>) {
        let count = self.active_tests.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Active attempts count: {}", count);
        self.ensure_sweep_task();
    }

    /// Called when an attempt is finalized by a user submit. The sweep
    /// reconciles against the store, so an undercount only delays the stop.
    pub fn deactivate(&self) {
        let _ = self
            .active_tests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some((n - 1).max(0)));
    }

    /// Seed the counter from a live store count; called at process start so
    /// attempts that were in progress before a restart keep their timeout
    /// enforcement.
    pub async fn reconcile_from_store(self: &Arc<Self>) -> AppResult<()> {
        let in_progress = self.attempts.count_in_progress().await? as i64;
        self.active_tests.store(in_progress, Ordering::SeqCst);

        log::info!("Found {} in-progress attempts at startup", in_progress);

        if in_progress > 0 {
            self.ensure_sweep_task();
        }
        Ok(())
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweep_running.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> i64 {
        self.active_tests.load(Ordering::SeqCst)
    }

    fn ensure_sweep_task(self: &Arc<Self>) {
        if self.sweep_running.swap(true, Ordering::SeqCst) {
            return;
        }

        log::info!(
            "Starting auto-submit sweep task (interval {:?})",
            self.sweep_interval
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.sweep_interval);
            // The first tick fires immediately; skip it so a freshly started
            // attempt is not swept in the same instant.
            interval.tick().await;

            loop {
                interval.tick().await;

                match scheduler.run_sweep_once().await {
                    Ok(remaining) => {
                        if !scheduler.conclude_cycle(remaining) {
                            log::info!(
                                "No in-progress attempts remain; stopping auto-submit sweep"
                            );
                            break;
                        }
                        log::debug!("Auto-submit sweep done; {} attempts remain", remaining);
                    }
                    Err(err) => {
                        // An error in one cycle is isolated; try again next
                        // cycle.
                        log::error!("Auto-submit sweep failed: {}", err);
                    }
                }
            }
        });
    }

    /// Decides whether the sweep loop runs another cycle. When nothing
    /// remains, the running flag is cleared and the activation counter is
    /// re-checked: an attempt started between the final recount and the flag
    /// clearing would otherwise be left with no sweep task, so it gets a
    /// fresh one.
    fn conclude_cycle(self: &Arc<Self>, remaining: u64) -> bool {
        if remaining > 0 {
            return true;
        }

        self.sweep_running.store(false, Ordering::SeqCst);
        if self.active_tests.load(Ordering::SeqCst) > 0 {
            self.ensure_sweep_task();
        }
        false
    }

    /// One pass over all IN_PROGRESS attempts, finalizing those whose time
    /// budget has elapsed. Per-attempt errors are logged and do not abort the
    /// rest of the sweep. Returns the number of attempts still in progress
    /// afterwards.
    pub async fn run_sweep_once(&self) -> AppResult<u64> {
        let now = Utc::now();
        let in_progress = self.attempts.find_in_progress().await?;

        let mut processed = 0u64;
        for attempt in &in_progress {
            if !attempt.is_expired(now) {
                continue;
            }

            match self.finalizer.finalize(&attempt.id).await {
                Ok(outcome) => {
                    if outcome.newly_finalized {
                        log::info!(
                            "Auto-submitted attempt {} (test {}) after time expiry",
                            attempt.id,
                            attempt.test_id
                        );
                        processed += 1;
                    }
                }
                Err(err) => {
                    log::error!("Error auto-submitting attempt {}: {}", attempt.id, err);
                }
            }
        }

        if processed > 0 {
            log::info!("Auto-submitted {} expired attempts", processed);
        }

        // Reconcile the counter against the store rather than trusting the
        // in-memory count.
        let remaining = self.attempts.count_in_progress().await?;
        self.active_tests.store(remaining as i64, Ordering::SeqCst);

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::{
        models::domain::{
            attempt::{AttemptResult, QuestionResponse, TestAttempt},
            ranking::RankingEntry,
        },
        repositories::RankingRepository,
        services::ranking_service::RankingService,
    };

    struct IdleAttemptRepository;

    #[async_trait]
    impl AttemptRepository for IdleAttemptRepository {
        async fn insert_new(&self, attempt: TestAttempt) -> AppResult<TestAttempt> {
            Ok(attempt)
        }

        async fn find_by_id(&self, _id: &str) -> AppResult<Option<TestAttempt>> {
            Ok(None)
        }

        async fn find_by_triple(
            &self,
            _user_id: &str,
            _series_id: &str,
            _test_id: &str,
        ) -> AppResult<Option<TestAttempt>> {
            Ok(None)
        }

        async fn find_in_progress_by_triple(
            &self,
            _user_id: &str,
            _series_id: &str,
            _test_id: &str,
        ) -> AppResult<Option<TestAttempt>> {
            Ok(None)
        }

        async fn push_response_if_absent(
            &self,
            _attempt_id: &str,
            _response: &QuestionResponse,
        ) -> AppResult<bool> {
            Ok(false)
        }

        async fn update_response_in_place(
            &self,
            _attempt_id: &str,
            _response: &QuestionResponse,
        ) -> AppResult<bool> {
            Ok(false)
        }

        async fn finalize_if_in_progress(
            &self,
            _attempt_id: &str,
            _submitted_at: DateTime<Utc>,
        ) -> AppResult<Option<TestAttempt>> {
            Ok(None)
        }

        async fn set_result(&self, _attempt_id: &str, _result: &AttemptResult) -> AppResult<()> {
            Ok(())
        }

        async fn set_rank(&self, _test_id: &str, _user_id: &str, _rank: u32) -> AppResult<()> {
            Ok(())
        }

        async fn count_in_progress(&self) -> AppResult<u64> {
            Ok(0)
        }

        async fn find_in_progress(&self) -> AppResult<Vec<TestAttempt>> {
            Ok(Vec::new())
        }

        async fn find_submitted_by_user(&self, _user_id: &str) -> AppResult<Vec<TestAttempt>> {
            Ok(Vec::new())
        }
    }

    struct IdleRankingRepository;

    #[async_trait]
    impl RankingRepository for IdleRankingRepository {
        async fn upsert_score(&self, entry: RankingEntry) -> AppResult<RankingEntry> {
            Ok(entry)
        }

        async fn find_by_test(&self, _test_id: &str) -> AppResult<Vec<RankingEntry>> {
            Ok(Vec::new())
        }

        async fn bulk_set_ranks(&self, _updates: &[(String, u32, u32)]) -> AppResult<()> {
            Ok(())
        }

        async fn find_by_test_ranked(&self, _test_id: &str) -> AppResult<Vec<RankingEntry>> {
            Ok(Vec::new())
        }
    }

    fn scheduler() -> Arc<AutoSubmitScheduler> {
        let attempts: Arc<dyn AttemptRepository> = Arc::new(IdleAttemptRepository);
        let ranking = Arc::new(RankingService::new(
            Arc::new(IdleRankingRepository),
            attempts.clone(),
        ));
        let finalizer = Arc::new(AttemptFinalizer::new(attempts.clone(), ranking));
        Arc::new(AutoSubmitScheduler::new(attempts, finalizer, 1))
    }

    #[tokio::test]
    async fn sweep_continues_while_attempts_remain() {
        let s = scheduler();
        s.sweep_running.store(true, Ordering::SeqCst);

        assert!(s.conclude_cycle(2));
        assert!(s.is_sweeping());
    }

    #[tokio::test]
    async fn sweep_stops_when_idle() {
        let s = scheduler();
        s.sweep_running.store(true, Ordering::SeqCst);

        assert!(!s.conclude_cycle(0));
        assert!(!s.is_sweeping());
    }

    #[tokio::test]
    async fn activation_racing_shutdown_respawns_the_task() {
        let s = scheduler();
        s.sweep_running.store(true, Ordering::SeqCst);
        // An attempt started after the sweep's final recount but before the
        // running flag cleared: its activate() saw the flag still set and
        // did not spawn a task.
        s.active_tests.store(1, Ordering::SeqCst);

        assert!(!s.conclude_cycle(0));
        assert!(s.is_sweeping());
    }

    #[tokio::test]
    async fn deactivate_never_goes_negative() {
        let s = scheduler();
        s.deactivate();
        assert_eq!(s.active_count(), 0);

        s.activate();
        s.deactivate();
        assert_eq!(s.active_count(), 0);
    }
}
