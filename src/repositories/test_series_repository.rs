use async_trait::async_trait;
use mongodb::{bson::doc, Collection};

#[cfg(test)]
use mockall::automock;

use crate::{db::Database, errors::AppResult, models::domain::test_series::TestSeries};

/// Read-only view of the catalog. The exam engine only ever fetches a whole
/// series (tests embedded) to gate starts and build snapshots.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TestSeriesRepository: Send + Sync {
    async fn find_by_id(&self, series_id: &str) -> AppResult<Option<TestSeries>>;
}

pub struct MongoTestSeriesRepository {
    collection: Collection<TestSeries>,
}

impl MongoTestSeriesRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.test_series(),
        }
    }
}

#[async_trait]
impl TestSeriesRepository for MongoTestSeriesRepository {
    async fn find_by_id(&self, series_id: &str) -> AppResult<Option<TestSeries>> {
        let series = self.collection.find_one(doc! { "id": series_id }).await?;
        Ok(series)
    }
}
