use serde::{Deserialize, Serialize};

use crate::models::domain::test_series::TestDefinition;

/// Immutable copy of a test's content and marking scheme, captured once at
/// attempt creation. All question serving and all scoring during an attempt
/// read from this value; later edits to the source test never reach an
/// attempt already started.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestSnapshot {
    pub test_name: String,
    pub duration_in_seconds: u64,
    pub positive_marks: Option<f64>,
    pub negative_marks: Option<f64>,
    pub total_marks: f64,
    pub sections: Vec<SnapshotSection>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SnapshotSection {
    pub id: String,
    pub title: String,
    pub questions: Vec<SnapshotQuestion>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SnapshotQuestion {
    pub id: String,
    pub question_number: Option<u32>,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: u32,
    pub explanation: Option<String>,
    pub marks: Option<f64>,
    pub negative_marks: Option<f64>,
}

impl TestSnapshot {
    /// Pure deep copy of a test definition. Must be called exactly once per
    /// attempt, at creation.
    pub fn build(test: &TestDefinition) -> Self {
        let total_marks = test
            .sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .map(|q| q.marks.unwrap_or(1.0))
            .sum();

        Self {
            test_name: test.test_name.clone(),
            duration_in_seconds: test.duration_in_seconds(),
            positive_marks: test.positive_marks,
            negative_marks: test.negative_marks,
            total_marks,
            sections: test
                .sections
                .iter()
                .map(|section| SnapshotSection {
                    id: section.id.clone(),
                    title: section.title.clone(),
                    questions: section
                        .questions
                        .iter()
                        .map(|q| SnapshotQuestion {
                            id: q.id.clone(),
                            question_number: q.question_number,
                            question_text: q.question_text.clone(),
                            options: q.options.clone(),
                            correct_option_index: q.correct_option_index,
                            explanation: q.explanation.clone(),
                            marks: q.marks,
                            negative_marks: q.negative_marks,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn find_question(&self, question_id: &str) -> Option<(&SnapshotSection, &SnapshotQuestion)> {
        self.sections.iter().find_map(|section| {
            section
                .questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| (section, q))
        })
    }

    pub fn find_section(&self, section_id: &str) -> Option<&SnapshotSection> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    /// Marks awarded for a correct answer to this question: per-question
    /// value, else the test default, else 1.
    pub fn positive_marks_for(&self, question: &SnapshotQuestion) -> f64 {
        question
            .marks
            .or(self.positive_marks)
            .unwrap_or(1.0)
    }

    /// Marks deducted for a wrong answer, always non-negative: per-question
    /// value, else the test default, else 0.
    pub fn negative_marks_for(&self, question: &SnapshotQuestion) -> f64 {
        question
            .negative_marks
            .or(self.negative_marks)
            .unwrap_or(0.0)
            .abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::test_series::{Question, Section};

    fn definition() -> TestDefinition {
        TestDefinition {
            id: "t-1".to_string(),
            test_name: "Sample Test".to_string(),
            duration_in_seconds: None,
            positive_marks: Some(2.0),
            negative_marks: Some(0.25),
            start_time: None,
            end_time: None,
            sections: vec![Section {
                id: "sec-1".to_string(),
                title: "Reasoning".to_string(),
                order: Some(1),
                questions: vec![
                    Question {
                        id: "q-1".to_string(),
                        question_number: Some(1),
                        question_text: "First".to_string(),
                        options: vec!["a".into(), "b".into()],
                        correct_option_index: 0,
                        explanation: None,
                        marks: Some(4.0),
                        negative_marks: Some(1.0),
                    },
                    Question {
                        id: "q-2".to_string(),
                        question_number: Some(2),
                        question_text: "Second".to_string(),
                        options: vec!["a".into(), "b".into(), "c".into()],
                        correct_option_index: 2,
                        explanation: Some("why".to_string()),
                        marks: None,
                        negative_marks: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn build_copies_content_and_computes_total_marks() {
        let snapshot = TestSnapshot::build(&definition());

        assert_eq!(snapshot.test_name, "Sample Test");
        assert_eq!(snapshot.duration_in_seconds, 3600);
        assert_eq!(snapshot.total_questions(), 2);
        // q-1 has explicit 4 marks, q-2 falls back to 1
        assert_eq!(snapshot.total_marks, 5.0);
    }

    #[test]
    fn build_is_decoupled_from_later_edits() {
        let mut test = definition();
        let snapshot = TestSnapshot::build(&test);

        test.sections[0].questions[0].correct_option_index = 1;
        test.sections[0].questions.pop();

        let (_, q) = snapshot.find_question("q-1").expect("q-1 in snapshot");
        assert_eq!(q.correct_option_index, 0);
        assert!(snapshot.find_question("q-2").is_some());
    }

    #[test]
    fn marking_fallback_chain() {
        let snapshot = TestSnapshot::build(&definition());

        let (_, q1) = snapshot.find_question("q-1").unwrap();
        assert_eq!(snapshot.positive_marks_for(q1), 4.0);
        assert_eq!(snapshot.negative_marks_for(q1), 1.0);

        // q-2 has no per-question marks, falls back to test-level defaults
        let (_, q2) = snapshot.find_question("q-2").unwrap();
        assert_eq!(snapshot.positive_marks_for(q2), 2.0);
        assert_eq!(snapshot.negative_marks_for(q2), 0.25);
    }

    #[test]
    fn negative_marks_are_normalized_to_magnitude() {
        let mut test = definition();
        test.sections[0].questions[0].negative_marks = Some(-1.5);
        let snapshot = TestSnapshot::build(&test);

        let (_, q1) = snapshot.find_question("q-1").unwrap();
        assert_eq!(snapshot.negative_marks_for(q1), 1.5);
    }

    #[test]
    fn find_question_reports_section() {
        let snapshot = TestSnapshot::build(&definition());
        let (section, _) = snapshot.find_question("q-2").unwrap();
        assert_eq!(section.id, "sec-1");
        assert!(snapshot.find_section("sec-1").is_some());
        assert!(snapshot.find_question("q-missing").is_none());
    }
}
