use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        MongoAttemptRepository, MongoPurchaseRepository, MongoRankingRepository,
        MongoTestSeriesRepository,
    },
    services::{
        AccessService, AttemptFinalizer, AttemptService, AutoSubmitScheduler, RankingService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub attempt_service: Arc<AttemptService>,
    pub scheduler: Arc<AutoSubmitScheduler>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Arc::new(Database::connect(&config).await?);

        let attempt_repository = Arc::new(MongoAttemptRepository::new(&db));
        attempt_repository.ensure_indexes().await?;

        let ranking_repository = Arc::new(MongoRankingRepository::new(&db));
        ranking_repository.ensure_indexes().await?;

        let series_repository = Arc::new(MongoTestSeriesRepository::new(&db));
        let purchase_repository = Arc::new(MongoPurchaseRepository::new(&db));

        let access_service = Arc::new(AccessService::new(purchase_repository));
        let ranking_service = Arc::new(RankingService::new(
            ranking_repository,
            attempt_repository.clone(),
        ));
        let finalizer = Arc::new(AttemptFinalizer::new(
            attempt_repository.clone(),
            ranking_service.clone(),
        ));
        let scheduler = Arc::new(AutoSubmitScheduler::new(
            attempt_repository.clone(),
            finalizer.clone(),
            config.auto_submit_interval_secs,
        ));

        let attempt_service = Arc::new(AttemptService::new(
            attempt_repository,
            series_repository,
            access_service,
            finalizer,
            ranking_service,
            scheduler.clone(),
        ));

        Ok(Self {
            db,
            attempt_service,
            scheduler,
            config: Arc::new(config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_cloneable() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
