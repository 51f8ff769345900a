use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::snapshot::TestSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttemptStatus {
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    /// Terminal; no transition out.
    #[serde(rename = "SUBMITTED")]
    Submitted,
}

/// One user's interaction with one question. At most one record per distinct
/// question per attempt; later calls overwrite in place.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuestionResponse {
    pub section_id: String,
    pub question_id: String,
    /// None when the question was only visited, or the answer was cleared.
    pub selected_option: Option<u32>,
    /// None iff unattempted; graded against the snapshot, never returned to
    /// the client while the attempt is in progress.
    pub is_correct: Option<bool>,
    pub attempted: bool,
    pub visited: bool,
    pub marked_for_review: bool,
    pub time_taken: u32,
}

impl QuestionResponse {
    pub fn visited_only(section_id: &str, question_id: &str) -> Self {
        Self {
            section_id: section_id.to_string(),
            question_id: question_id.to_string(),
            selected_option: None,
            is_correct: None,
            attempted: false,
            visited: true,
            marked_for_review: false,
            time_taken: 0,
        }
    }
}

/// Result fields computed exactly once at finalization and frozen thereafter.
#[derive(Clone, Debug, PartialEq, Default, Deserialize, Serialize)]
pub struct AttemptResult {
    pub score: f64,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    /// correct / attempted * 100; 0 when nothing was attempted.
    pub accuracy: f64,
    /// correct / total questions * 100; unlike accuracy, this one penalizes
    /// non-attempts.
    pub percentage: f64,
    /// Questions answered per minute of elapsed time.
    pub speed: f64,
}

/// The central aggregate: one user's run through one test, from start to
/// (eventual) submission. Identified by the (user, series, test) triple,
/// unique for non-admin attempts.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestAttempt {
    pub id: String,
    pub user_id: String,
    /// Display name captured at start so leaderboards need no user join.
    pub user_name: String,
    pub series_id: String,
    pub test_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, atomically with the status transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Write-once at creation; no code path mutates it afterwards.
    pub snapshot: TestSnapshot,
    pub responses: Vec<QuestionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AttemptResult>,
    /// Filled in asynchronously by the ranking engine after submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Admin preview runs: exempt from the uniqueness constraint and from
    /// ranking participation.
    #[serde(default)]
    pub is_admin_attempt: bool,
}

impl TestAttempt {
    pub fn new(
        user_id: &str,
        user_name: &str,
        series_id: &str,
        test_id: &str,
        snapshot: TestSnapshot,
        is_admin_attempt: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            series_id: series_id.to_string(),
            test_id: test_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
            snapshot,
            responses: Vec::new(),
            result: None,
            rank: None,
            is_admin_attempt,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    pub fn response_for(&self, question_id: &str) -> Option<&QuestionResponse> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }

    /// Seconds left of the attempt's time budget; 0 once elapsed.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        self.snapshot.duration_in_seconds.saturating_sub(elapsed)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(now) == 0
    }
}

/// Palette status of a question inside the live exam view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum QuestionStatus {
    #[serde(rename = "UNVISITED")]
    Unvisited,
    #[serde(rename = "ANSWERED")]
    Answered,
    #[serde(rename = "ANSWERED_MARKED")]
    AnsweredMarked,
    #[serde(rename = "MARKED")]
    Marked,
    #[serde(rename = "UNANSWERED")]
    Unanswered,
}

impl QuestionStatus {
    pub fn derive(response: Option<&QuestionResponse>) -> Self {
        match response {
            None => QuestionStatus::Unvisited,
            Some(r) => match (r.selected_option.is_some(), r.marked_for_review) {
                (true, true) => QuestionStatus::AnsweredMarked,
                (true, false) => QuestionStatus::Answered,
                (false, true) => QuestionStatus::Marked,
                (false, false) => {
                    if r.visited {
                        QuestionStatus::Unanswered
                    } else {
                        QuestionStatus::Unvisited
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot() -> TestSnapshot {
        TestSnapshot {
            test_name: "T".to_string(),
            duration_in_seconds: 60,
            positive_marks: None,
            negative_marks: None,
            total_marks: 1.0,
            sections: vec![],
        }
    }

    fn attempt() -> TestAttempt {
        TestAttempt::new("user-1", "Test User", "series-1", "t-1", snapshot(), false)
    }

    #[test]
    fn new_attempt_starts_in_progress_with_empty_responses() {
        let a = attempt();
        assert_eq!(a.status, AttemptStatus::InProgress);
        assert!(a.responses.is_empty());
        assert!(a.submitted_at.is_none());
        assert!(a.result.is_none());
        assert!(!a.is_admin_attempt);
    }

    #[test]
    fn remaining_seconds_counts_down_and_saturates() {
        let mut a = attempt();
        a.started_at = Utc::now() - Duration::seconds(45);
        let remaining = a.remaining_seconds(Utc::now());
        assert!(remaining <= 15);
        assert!(!a.is_expired(Utc::now()));

        a.started_at = Utc::now() - Duration::seconds(61);
        assert_eq!(a.remaining_seconds(Utc::now()), 0);
        assert!(a.is_expired(Utc::now()));
    }

    #[test]
    fn question_status_derivation() {
        assert_eq!(QuestionStatus::derive(None), QuestionStatus::Unvisited);

        let mut r = QuestionResponse::visited_only("sec-1", "q-1");
        assert_eq!(QuestionStatus::derive(Some(&r)), QuestionStatus::Unanswered);

        r.marked_for_review = true;
        assert_eq!(QuestionStatus::derive(Some(&r)), QuestionStatus::Marked);

        r.selected_option = Some(2);
        assert_eq!(
            QuestionStatus::derive(Some(&r)),
            QuestionStatus::AnsweredMarked
        );

        r.marked_for_review = false;
        assert_eq!(QuestionStatus::derive(Some(&r)), QuestionStatus::Answered);
    }

    #[test]
    fn status_serializes_with_wire_names() {
        let json = serde_json::to_string(&AttemptStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        let json = serde_json::to_string(&AttemptStatus::Submitted).unwrap();
        assert_eq!(json, "\"SUBMITTED\"");
    }
}
