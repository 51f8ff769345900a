use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub section_id: String,

    #[validate(length(min = 1, max = 100))]
    pub question_id: String,

    /// None clears a previously selected answer.
    pub selected_option: Option<u32>,

    /// Seconds spent on this question.
    #[serde(default)]
    pub time_taken: u32,

    #[serde(default)]
    pub marked_for_review: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VisitQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub section_id: String,

    #[validate(length(min = 1, max = 100))]
    pub question_id: String,
}
