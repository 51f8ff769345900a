pub mod attempt;
pub mod purchase;
pub mod ranking;
pub mod snapshot;
pub mod test_series;

pub use attempt::{AttemptResult, AttemptStatus, QuestionResponse, QuestionStatus, TestAttempt};
pub use purchase::{ItemKind, Purchase, PurchaseStatus};
pub use ranking::RankingEntry;
pub use snapshot::{SnapshotQuestion, SnapshotSection, TestSnapshot};
pub use test_series::{Question, Section, TestDefinition, TestSeries, TestState};
