pub mod access_service;
pub mod attempt_service;
pub mod auto_submit;
pub mod finalizer;
pub mod ranking_service;
pub mod scoring;

pub use access_service::{AccessDecision, AccessService};
pub use attempt_service::AttemptService;
pub use auto_submit::AutoSubmitScheduler;
pub use finalizer::{AttemptFinalizer, FinalizeOutcome};
pub use ranking_service::RankingService;
