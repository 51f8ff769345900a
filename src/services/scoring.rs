use chrono::{DateTime, Utc};

use crate::models::domain::{
    attempt::{AttemptResult, QuestionResponse},
    snapshot::TestSnapshot,
};

/// Computes the frozen result fields from the snapshot and recorded
/// responses only; the live test definition plays no part. Called exactly
/// once, at the IN_PROGRESS -> SUBMITTED transition.
pub fn compute_result(
    snapshot: &TestSnapshot,
    responses: &[QuestionResponse],
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
) -> AttemptResult {
    let total_questions = snapshot.total_questions() as u32;

    let correct = responses
        .iter()
        .filter(|r| r.is_correct == Some(true))
        .count() as u32;
    let incorrect = responses
        .iter()
        .filter(|r| r.is_correct == Some(false))
        .count() as u32;
    let attempted = correct + incorrect;
    let unattempted = total_questions.saturating_sub(attempted);

    let mut score = 0.0;
    for response in responses {
        let Some((_, question)) = snapshot.find_question(&response.question_id) else {
            continue;
        };

        match response.is_correct {
            Some(true) => score += snapshot.positive_marks_for(question),
            Some(false) => score -= snapshot.negative_marks_for(question),
            None => {}
        }
    }

    let accuracy = if attempted > 0 {
        f64::from(correct) / f64::from(attempted) * 100.0
    } else {
        0.0
    };

    let percentage = if total_questions > 0 {
        f64::from(correct) / f64::from(total_questions) * 100.0
    } else {
        0.0
    };

    let minutes_elapsed = (submitted_at - started_at).num_milliseconds() as f64 / 60_000.0;
    let speed = if minutes_elapsed > 0.0 {
        f64::from(attempted) / minutes_elapsed
    } else {
        0.0
    };

    AttemptResult {
        score,
        correct,
        incorrect,
        unattempted,
        accuracy,
        percentage,
        speed,
    }
}
