use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FREE_QUOTA: usize = 2;
pub const DEFAULT_DURATION_SECS: u64 = 3600;

/// Catalog aggregate owned by the admin subsystem. This engine treats it as
/// read-only; attempts never read it after the snapshot is taken.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestSeries {
    pub id: String,
    pub name: String,
    /// Number of tests, by ordinal position, accessible without a purchase.
    #[serde(default)]
    pub free_quota: Option<usize>,
    pub tests: Vec<TestDefinition>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestDefinition {
    pub id: String,
    pub test_name: String,
    #[serde(default)]
    pub duration_in_seconds: Option<u64>,
    /// Test-level marking defaults, overridable per question.
    #[serde(default)]
    pub positive_marks: Option<f64>,
    #[serde(default)]
    pub negative_marks: Option<f64>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub sections: Vec<Section>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub order: Option<u32>,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub question_number: Option<u32>,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: u32,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default)]
    pub negative_marks: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestState {
    Upcoming,
    Live,
    ResultsAvailable,
    /// No timing configured on the test.
    Untimed,
}

impl TestDefinition {
    pub fn state_at(&self, now: DateTime<Utc>) -> TestState {
        let (start, end) = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (start, end),
            _ => return TestState::Untimed,
        };

        if now < start {
            TestState::Upcoming
        } else if now <= end {
            TestState::Live
        } else {
            TestState::ResultsAvailable
        }
    }

    /// Whether a new attempt may be started right now. Untimed tests are
    /// always startable.
    pub fn is_startable_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state_at(now), TestState::Live | TestState::Untimed)
    }

    pub fn duration_in_seconds(&self) -> u64 {
        self.duration_in_seconds.unwrap_or(DEFAULT_DURATION_SECS)
    }
}

impl TestSeries {
    pub fn free_quota(&self) -> usize {
        self.free_quota.unwrap_or(DEFAULT_FREE_QUOTA)
    }

    pub fn find_test(&self, test_id: &str) -> Option<&TestDefinition> {
        self.tests.iter().find(|t| t.id == test_id)
    }

    /// Ordinal position of a test within the series, used for the free-quota
    /// check.
    pub fn test_position(&self, test_id: &str) -> Option<usize> {
        self.tests.iter().position(|t| t.id == test_id)
    }

    pub fn is_test_free(&self, test_id: &str) -> bool {
        self.test_position(test_id)
            .map(|pos| pos < self.free_quota())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_number: Some(1),
            question_text: "What is 2 + 2?".to_string(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_option_index: 1,
            explanation: Some("Basic arithmetic".to_string()),
            marks: None,
            negative_marks: None,
        }
    }

    fn make_test(id: &str) -> TestDefinition {
        TestDefinition {
            id: id.to_string(),
            test_name: format!("Test {}", id),
            duration_in_seconds: Some(60),
            positive_marks: None,
            negative_marks: None,
            start_time: None,
            end_time: None,
            sections: vec![Section {
                id: "sec-1".to_string(),
                title: "General".to_string(),
                order: Some(1),
                questions: vec![make_question("q-1")],
            }],
        }
    }

    fn make_series() -> TestSeries {
        TestSeries {
            id: "series-1".to_string(),
            name: "Mock Series".to_string(),
            free_quota: None,
            tests: vec![make_test("t-1"), make_test("t-2"), make_test("t-3")],
        }
    }

    #[test]
    fn free_quota_defaults_to_two() {
        let series = make_series();
        assert!(series.is_test_free("t-1"));
        assert!(series.is_test_free("t-2"));
        assert!(!series.is_test_free("t-3"));
    }

    #[test]
    fn explicit_free_quota_is_respected() {
        let mut series = make_series();
        series.free_quota = Some(0);
        assert!(!series.is_test_free("t-1"));
    }

    #[test]
    fn untimed_test_is_startable() {
        let test = make_test("t-1");
        assert_eq!(test.state_at(Utc::now()), TestState::Untimed);
        assert!(test.is_startable_at(Utc::now()));
    }

    #[test]
    fn timed_test_states() {
        let now = Utc::now();
        let mut test = make_test("t-1");
        test.start_time = Some(now - Duration::hours(1));
        test.end_time = Some(now + Duration::hours(1));
        assert_eq!(test.state_at(now), TestState::Live);
        assert!(test.is_startable_at(now));

        test.start_time = Some(now + Duration::hours(1));
        test.end_time = Some(now + Duration::hours(2));
        assert_eq!(test.state_at(now), TestState::Upcoming);
        assert!(!test.is_startable_at(now));

        test.start_time = Some(now - Duration::hours(2));
        test.end_time = Some(now - Duration::hours(1));
        assert_eq!(test.state_at(now), TestState::ResultsAvailable);
        assert!(!test.is_startable_at(now));
    }
}
