use async_trait::async_trait;
use mongodb::{bson::doc, Collection};

#[cfg(test)]
use mockall::automock;

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::purchase::{ItemKind, Purchase},
};

/// Entitlement lookups against the purchase records written by the payment
/// subsystem. Expiry evaluation happens in the access resolver, not in the
/// query, so an expired purchase is still returned here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn find_completed_covering(
        &self,
        user_id: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> AppResult<Option<Purchase>>;
}

pub struct MongoPurchaseRepository {
    collection: Collection<Purchase>,
}

impl MongoPurchaseRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.purchases(),
        }
    }
}

#[async_trait]
impl PurchaseRepository for MongoPurchaseRepository {
    async fn find_completed_covering(
        &self,
        user_id: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> AppResult<Option<Purchase>> {
        let spellings: Vec<&str> = kind.stored_spellings().to_vec();
        // Both conditions must hold on the same array element; dotted
        // top-level paths would match them against different items.
        let purchase = self
            .collection
            .find_one(doc! {
                "user_id": user_id,
                "status": "completed",
                "items": {
                    "$elemMatch": {
                        "item_kind": { "$in": spellings },
                        "item_id": item_id,
                    }
                },
            })
            .await?;
        Ok(purchase)
    }
}
