pub mod attempt_repository;
pub mod purchase_repository;
pub mod ranking_repository;
pub mod test_series_repository;

pub use attempt_repository::{AttemptRepository, MongoAttemptRepository};
pub use purchase_repository::{MongoPurchaseRepository, PurchaseRepository};
pub use ranking_repository::{MongoRankingRepository, RankingRepository};
pub use test_series_repository::{MongoTestSeriesRepository, TestSeriesRepository};
