use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::{AttemptStatus, QuestionStatus, TestAttempt};

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: String,
    pub test_name: String,
    pub duration_in_seconds: u64,
    pub total_marks: f64,
    pub started_at: DateTime<Utc>,
    pub status: AttemptStatus,
    pub resumed: bool,
}

impl StartAttemptResponse {
    pub fn from_attempt(attempt: &TestAttempt, resumed: bool) -> Self {
        Self {
            attempt_id: attempt.id.clone(),
            test_name: attempt.snapshot.test_name.clone(),
            duration_in_seconds: attempt.snapshot.duration_in_seconds,
            total_marks: attempt.snapshot.total_marks,
            started_at: attempt.started_at,
            status: attempt.status,
            resumed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitTestResponse {
    pub attempt_id: String,
    pub status: AttemptStatus,
    pub score: f64,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub accuracy: f64,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmitTestResponse {
    pub fn from_attempt(attempt: &TestAttempt) -> Self {
        let result = attempt.result.clone().unwrap_or_default();
        Self {
            attempt_id: attempt.id.clone(),
            status: attempt.status,
            score: result.score,
            correct: result.correct,
            incorrect: result.incorrect,
            unattempted: result.unattempted,
            accuracy: result.accuracy,
            percentage: result.percentage,
            submitted_at: attempt.submitted_at,
        }
    }
}

/// Live exam view, served only from the snapshot and the recorded responses.
/// Never carries correct answers or explanations.
#[derive(Debug, Serialize)]
pub struct LiveQuestionsResponse {
    pub remaining_time: u64,
    pub sections: Vec<LiveSection>,
    pub palette: PaletteCounts,
    pub test_info: LiveTestInfo,
}

#[derive(Debug, Serialize)]
pub struct LiveSection {
    pub section_id: String,
    pub title: String,
    pub questions: Vec<LiveQuestion>,
}

#[derive(Debug, Serialize)]
pub struct LiveQuestion {
    pub question_id: String,
    pub question_number: Option<u32>,
    pub question_text: String,
    pub options: Vec<String>,
    pub status: QuestionStatus,
    pub selected_option: Option<u32>,
    pub marked_for_review: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PaletteCounts {
    pub answered: u32,
    pub answered_marked: u32,
    pub unanswered: u32,
    pub marked: u32,
    pub unvisited: u32,
}

#[derive(Debug, Serialize)]
pub struct LiveTestInfo {
    pub test_name: String,
    pub total_questions: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ResultAnalysisResponse {
    pub summary: ResultSummary,
    pub section_report: Vec<SectionReport>,
    pub performance_analysis: PerformanceAnalysis,
    pub question_report: Vec<QuestionReport>,
}

#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub test_name: String,
    pub score: f64,
    pub max_score: f64,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub accuracy: f64,
    pub percentage: f64,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_participants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SectionReport {
    pub section_name: String,
    pub correct: u32,
    pub incorrect: u32,
    pub unattempted: u32,
    pub accuracy: f64,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PerformanceAnalysis {
    pub strongest_area: Option<String>,
    pub weakest_area: Option<String>,
}

/// Per-question breakdown; only served after submission, so correct answers
/// and explanations are safe to include.
#[derive(Debug, Serialize)]
pub struct QuestionReport {
    pub section: String,
    pub question_text: String,
    pub user_answer: Option<u32>,
    pub correct_answer: u32,
    pub status: QuestionReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum QuestionReportStatus {
    Correct,
    Incorrect,
    Unattempted,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub test_id: String,
    pub total_participants: u32,
    pub leaderboard: Vec<LeaderboardRow>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardRow {
    pub position: u32,
    pub user_name: String,
    pub score: f64,
    pub accuracy: f64,
    pub total_participants: u32,
}

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub attempt_id: String,
    pub test_name: String,
    pub series_id: String,
    pub test_id: String,
    pub status: AttemptStatus,
    pub score: f64,
    pub accuracy: f64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AttemptSummary {
    pub fn from_attempt(attempt: &TestAttempt) -> Self {
        let result = attempt.result.clone().unwrap_or_default();
        Self {
            attempt_id: attempt.id.clone(),
            test_name: attempt.snapshot.test_name.clone(),
            series_id: attempt.series_id.clone(),
            test_id: attempt.test_id.clone(),
            status: attempt.status,
            score: result.score,
            accuracy: result.accuracy,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
        }
    }
}
