use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    auth::{require_owner_or_admin, Claims},
    errors::{AppError, AppResult},
    models::{
        domain::{
            attempt::{AttemptStatus, QuestionResponse, TestAttempt},
            snapshot::TestSnapshot,
            QuestionStatus,
        },
        dto::{
            request::{SubmitQuestionRequest, VisitQuestionRequest},
            response::{
                AttemptSummary, LeaderboardResponse, LeaderboardRow, LiveQuestion,
                LiveQuestionsResponse, LiveSection, LiveTestInfo, PaletteCounts,
                PerformanceAnalysis, QuestionReport, QuestionReportStatus, ResultAnalysisResponse,
                ResultSummary, SectionReport,
            },
        },
    },
    repositories::{AttemptRepository, TestSeriesRepository},
    services::{
        access_service::AccessService, auto_submit::AutoSubmitScheduler,
        finalizer::AttemptFinalizer, ranking_service::RankingService,
    },
};

/// The attempt state machine: IN_PROGRESS at start, SUBMITTED exactly once,
/// never back. Everything between start and finalization is an idempotent
/// upsert against the attempt's response collection, validated against the
/// snapshot and never the live test definition.
pub struct AttemptService {
    attempts: Arc<dyn AttemptRepository>,
    series: Arc<dyn TestSeriesRepository>,
    access: Arc<AccessService>,
    finalizer: Arc<AttemptFinalizer>,
    ranking: Arc<RankingService>,
    scheduler: Arc<AutoSubmitScheduler>,
}

impl AttemptService {
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        series: Arc<dyn TestSeriesRepository>,
        access: Arc<AccessService>,
        finalizer: Arc<AttemptFinalizer>,
        ranking: Arc<RankingService>,
        scheduler: Arc<AutoSubmitScheduler>,
    ) -> Self {
        Self {
            attempts,
            series,
            access,
            finalizer,
            ranking,
            scheduler,
        }
    }

    /// Start (or resume) an attempt. Idempotent for the non-admin triple: a
    /// second start while IN_PROGRESS returns the same attempt; after
    /// submission it conflicts. Admins get unlimited preview attempts that
    /// never enter the rankings.
    pub async fn start_attempt(
        &self,
        claims: &Claims,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<(TestAttempt, bool)> {
        let series = self
            .series
            .find_by_id(series_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Test series not found".to_string()))?;

        let test = series
            .find_test(test_id)
            .ok_or_else(|| AppError::NotFound("Test not found in this series".to_string()))?;

        let is_admin_attempt = claims.is_admin();

        if !is_admin_attempt {
            if let Some(existing) = self
                .attempts
                .find_by_triple(&claims.sub, series_id, test_id)
                .await?
            {
                return match existing.status {
                    AttemptStatus::InProgress => Ok((existing, true)),
                    AttemptStatus::Submitted => Err(AppError::Conflict(
                        "You have already completed this test".to_string(),
                    )),
                };
            }
        }

        let decision = self.access.can_start(claims, &series, test_id).await?;
        if !decision.allowed {
            return Err(AppError::Forbidden(decision.reason.unwrap_or_else(|| {
                "You do not have access to this test series".to_string()
            })));
        }

        if !test.is_startable_at(Utc::now()) {
            return Err(AppError::ValidationError(
                "Test is not live right now".to_string(),
            ));
        }

        let snapshot = TestSnapshot::build(test);
        let attempt = TestAttempt::new(
            &claims.sub,
            &claims.username,
            series_id,
            test_id,
            snapshot,
            is_admin_attempt,
        );

        // The unique index makes a concurrent duplicate insert fail as a
        // Conflict instead of corrupting state.
        let attempt = self.attempts.insert_new(attempt).await?;

        self.scheduler.activate();

        Ok((attempt, false))
    }

    /// Record (or overwrite) the caller's answer for one question. The
    /// response collection never gains a second entry for the same question,
    /// and the caller never learns whether the answer was correct.
    pub async fn submit_question(
        &self,
        claims: &Claims,
        series_id: &str,
        test_id: &str,
        request: SubmitQuestionRequest,
    ) -> AppResult<()> {
        request.validate()?;

        let attempt = self.require_active_attempt(claims, series_id, test_id).await?;

        let (section, question) = attempt
            .snapshot
            .find_question(&request.question_id)
            .ok_or_else(|| AppError::NotFound("Question not found in test".to_string()))?;

        if let Some(selected) = request.selected_option {
            if selected as usize >= question.options.len() {
                return Err(AppError::ValidationError(
                    "Invalid option selected".to_string(),
                ));
            }
        }

        let response = QuestionResponse {
            section_id: section.id.clone(),
            question_id: request.question_id.clone(),
            selected_option: request.selected_option,
            is_correct: request
                .selected_option
                .map(|selected| selected == question.correct_option_index),
            attempted: request.selected_option.is_some(),
            visited: true,
            marked_for_review: request.marked_for_review,
            time_taken: request.time_taken,
        };

        // Two-phase upsert: append if no entry exists for the question,
        // otherwise overwrite in place. Both writes are conditioned on the
        // attempt still being IN_PROGRESS.
        if !self
            .attempts
            .push_response_if_absent(&attempt.id, &response)
            .await?
        {
            let updated = self
                .attempts
                .update_response_in_place(&attempt.id, &response)
                .await?;
            if !updated {
                return Err(AppError::Conflict("Test already submitted".to_string()));
            }
        }

        Ok(())
    }

    /// Navigation tracking: create a visited-only response on first visit;
    /// a later visit to an already-touched question changes nothing.
    pub async fn visit_question(
        &self,
        claims: &Claims,
        series_id: &str,
        test_id: &str,
        request: VisitQuestionRequest,
    ) -> AppResult<()> {
        request.validate()?;

        let attempt = self.require_active_attempt(claims, series_id, test_id).await?;

        let (section, _) = attempt
            .snapshot
            .find_question(&request.question_id)
            .ok_or_else(|| AppError::NotFound("Question not found in test".to_string()))?;

        if attempt.response_for(&request.question_id).is_some() {
            return Ok(());
        }

        let response = QuestionResponse::visited_only(&section.id, &request.question_id);
        // A lost race against a concurrent answer submission is fine; the
        // guard in the filter keeps the entry unique either way.
        self.attempts
            .push_response_if_absent(&attempt.id, &response)
            .await?;

        Ok(())
    }

    /// Finalize the caller's attempt. Racing submits (or a race against the
    /// auto-submit sweep) all resolve to the same single finalization; losers
    /// get the already-final result back.
    pub async fn submit_test(
        &self,
        claims: &Claims,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<TestAttempt> {
        let active = self
            .attempts
            .find_in_progress_by_triple(&claims.sub, series_id, test_id)
            .await?;

        let attempt_id = match active {
            Some(attempt) => attempt.id,
            None => {
                // Nothing in progress: either already submitted (idempotent
                // result) or never started.
                let existing = self
                    .attempts
                    .find_by_triple(&claims.sub, series_id, test_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound("Test attempt not found".to_string())
                    })?;
                return Ok(existing);
            }
        };

        let outcome = self.finalizer.finalize(&attempt_id).await?;
        if outcome.newly_finalized {
            self.scheduler.deactivate();
        }

        Ok(outcome.attempt)
    }

    /// Live exam view: remaining time, palette, and questions without
    /// correct answers or explanations. Served entirely from the snapshot
    /// and the recorded responses.
    pub async fn live_questions(
        &self,
        claims: &Claims,
        attempt_id: &str,
    ) -> AppResult<LiveQuestionsResponse> {
        let attempt = self.require_attempt(claims, attempt_id).await?;

        let sections: Vec<LiveSection> = attempt
            .snapshot
            .sections
            .iter()
            .map(|section| LiveSection {
                section_id: section.id.clone(),
                title: section.title.clone(),
                questions: section
                    .questions
                    .iter()
                    .map(|question| {
                        let response = attempt.response_for(&question.id);
                        LiveQuestion {
                            question_id: question.id.clone(),
                            question_number: question.question_number,
                            question_text: question.question_text.clone(),
                            options: question.options.clone(),
                            status: QuestionStatus::derive(response),
                            selected_option: response.and_then(|r| r.selected_option),
                            marked_for_review: response.map(|r| r.marked_for_review).unwrap_or(false),
                        }
                    })
                    .collect(),
            })
            .collect();

        let mut palette = PaletteCounts::default();
        for question in sections.iter().flat_map(|s| s.questions.iter()) {
            match question.status {
                QuestionStatus::Answered => palette.answered += 1,
                QuestionStatus::AnsweredMarked => palette.answered_marked += 1,
                QuestionStatus::Unanswered => palette.unanswered += 1,
                QuestionStatus::Marked => palette.marked += 1,
                QuestionStatus::Unvisited => palette.unvisited += 1,
            }
        }

        Ok(LiveQuestionsResponse {
            remaining_time: attempt.remaining_seconds(Utc::now()),
            palette,
            test_info: LiveTestInfo {
                test_name: attempt.snapshot.test_name.clone(),
                total_questions: attempt.snapshot.total_questions(),
                started_at: attempt.started_at,
            },
            sections,
        })
    }

    /// Full post-submission breakdown, including correct answers and
    /// explanations. Refused while the attempt is still in progress.
    pub async fn result_analysis(
        &self,
        claims: &Claims,
        attempt_id: &str,
    ) -> AppResult<ResultAnalysisResponse> {
        let attempt = self.require_attempt(claims, attempt_id).await?;

        if attempt.is_in_progress() {
            return Err(AppError::Conflict(
                "Test result not yet generated".to_string(),
            ));
        }

        let result = attempt.result.clone().ok_or_else(|| {
            AppError::InternalError("Submitted attempt has no result".to_string())
        })?;

        let ranking_entry = if attempt.is_admin_attempt {
            None
        } else {
            self.ranking
                .entry_for_user(&attempt.test_id, &attempt.user_id)
                .await?
        };

        let percentile = ranking_entry.as_ref().and_then(|entry| {
            if entry.total_participants > 1 {
                Some(
                    f64::from(entry.total_participants - entry.rank)
                        / f64::from(entry.total_participants - 1)
                        * 100.0,
                )
            } else {
                None
            }
        });

        let section_report: Vec<SectionReport> = attempt
            .snapshot
            .sections
            .iter()
            .map(|section| {
                let responses: Vec<&QuestionResponse> = attempt
                    .responses
                    .iter()
                    .filter(|r| r.section_id == section.id)
                    .collect();
                let correct = responses
                    .iter()
                    .filter(|r| r.is_correct == Some(true))
                    .count() as u32;
                let incorrect = responses
                    .iter()
                    .filter(|r| r.is_correct == Some(false))
                    .count() as u32;
                let total = section.questions.len();
                let attempted = correct + incorrect;

                SectionReport {
                    section_name: section.title.clone(),
                    correct,
                    incorrect,
                    unattempted: (total as u32).saturating_sub(attempted),
                    accuracy: if attempted > 0 {
                        f64::from(correct) / f64::from(attempted) * 100.0
                    } else {
                        0.0
                    },
                    total,
                }
            })
            .collect();

        let strongest_area = section_report
            .iter()
            .max_by(|a, b| a.accuracy.partial_cmp(&b.accuracy).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| s.section_name.clone());
        let weakest_area = section_report
            .iter()
            .min_by(|a, b| a.accuracy.partial_cmp(&b.accuracy).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| s.section_name.clone());

        let question_report: Vec<QuestionReport> = attempt
            .snapshot
            .sections
            .iter()
            .flat_map(|section| {
                section.questions.iter().map(|question| {
                    let response = attempt.response_for(&question.id);
                    let status = match response.and_then(|r| r.is_correct) {
                        Some(true) => QuestionReportStatus::Correct,
                        Some(false) => QuestionReportStatus::Incorrect,
                        None => QuestionReportStatus::Unattempted,
                    };

                    QuestionReport {
                        section: section.title.clone(),
                        question_text: question.question_text.clone(),
                        user_answer: response.and_then(|r| r.selected_option),
                        correct_answer: question.correct_option_index,
                        status,
                        explanation: question.explanation.clone(),
                    }
                })
            })
            .collect();

        Ok(ResultAnalysisResponse {
            summary: ResultSummary {
                test_name: attempt.snapshot.test_name.clone(),
                score: result.score,
                max_score: attempt.snapshot.total_marks,
                correct: result.correct,
                incorrect: result.incorrect,
                unattempted: result.unattempted,
                accuracy: result.accuracy,
                percentage: result.percentage,
                speed: result.speed,
                rank: ranking_entry.as_ref().map(|e| e.rank),
                total_participants: ranking_entry.as_ref().map(|e| e.total_participants),
                percentile,
            },
            section_report,
            performance_analysis: PerformanceAnalysis {
                strongest_area,
                weakest_area,
            },
            question_report,
        })
    }

    /// The caller's submitted attempts, newest first.
    pub async fn my_attempts(&self, claims: &Claims) -> AppResult<Vec<AttemptSummary>> {
        let attempts = self.attempts.find_submitted_by_user(&claims.sub).await?;
        Ok(attempts.iter().map(AttemptSummary::from_attempt).collect())
    }

    pub async fn leaderboard(
        &self,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<LeaderboardResponse> {
        let series = self
            .series
            .find_by_id(series_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Test series not found".to_string()))?;

        if series.find_test(test_id).is_none() {
            return Err(AppError::NotFound(
                "Test not found in this series".to_string(),
            ));
        }

        let entries = self.ranking.standings(test_id).await?;
        let total_participants = entries.len() as u32;

        Ok(LeaderboardResponse {
            test_id: test_id.to_string(),
            total_participants,
            leaderboard: entries
                .into_iter()
                .map(|entry| LeaderboardRow {
                    position: entry.rank,
                    user_name: entry.user_name,
                    score: entry.score,
                    accuracy: entry.accuracy,
                    total_participants,
                })
                .collect(),
        })
    }

    async fn require_attempt(&self, claims: &Claims, attempt_id: &str) -> AppResult<TestAttempt> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Test attempt not found".to_string()))?;

        require_owner_or_admin(claims, &attempt.user_id)?;
        Ok(attempt)
    }

    /// The caller's running attempt for the (series, test) pair, or the
    /// precise reason there is none.
    async fn require_active_attempt(
        &self,
        claims: &Claims,
        series_id: &str,
        test_id: &str,
    ) -> AppResult<TestAttempt> {
        if let Some(attempt) = self
            .attempts
            .find_in_progress_by_triple(&claims.sub, series_id, test_id)
            .await?
        {
            return Ok(attempt);
        }

        match self
            .attempts
            .find_by_triple(&claims.sub, series_id, test_id)
            .await?
        {
            Some(_) => Err(AppError::Conflict("Test already submitted".to_string())),
            None => Err(AppError::NotFound("Test attempt not found".to_string())),
        }
    }
}
