use std::sync::Arc;

use chrono::Utc;

use crate::{
    auth::Claims,
    errors::AppResult,
    models::domain::{purchase::ItemKind, test_series::TestSeries},
    repositories::PurchaseRepository,
};

/// Outcome of the start gate. `reason` is human-readable and is what callers
/// surface inside a Forbidden error; a denial here is never fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Decides whether a user may start a test: free-quota position, valid paid
/// entitlement, or admin. Pure read; no side effects.
pub struct AccessService {
    purchases: Arc<dyn PurchaseRepository>,
}

impl AccessService {
    pub fn new(purchases: Arc<dyn PurchaseRepository>) -> Self {
        Self { purchases }
    }

    pub async fn can_start(
        &self,
        claims: &Claims,
        series: &TestSeries,
        test_id: &str,
    ) -> AppResult<AccessDecision> {
        if series.is_test_free(test_id) {
            return Ok(AccessDecision::allow());
        }

        if claims.is_admin() {
            return Ok(AccessDecision::allow());
        }

        let purchase = self
            .purchases
            .find_completed_covering(&claims.sub, ItemKind::TestSeries, &series.id)
            .await?;

        // Coverage is verified on the returned document itself, never
        // assumed from the store query.
        match purchase {
            Some(purchase) if purchase.covers(ItemKind::TestSeries, &series.id) => {
                if purchase.is_valid_at(Utc::now()) {
                    Ok(AccessDecision::allow())
                } else {
                    Ok(AccessDecision::deny(
                        "Your access to this test series has expired",
                    ))
                }
            }
            _ => Ok(AccessDecision::deny(
                "You do not have access to this test series",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mockall::predicate::eq;

    use crate::{
        auth::UserRole,
        models::domain::purchase::{Purchase, PurchaseItem, PurchaseStatus},
        models::domain::test_series::{TestDefinition, TestSeries},
        repositories::purchase_repository::MockPurchaseRepository,
    };

    fn test_def(id: &str) -> TestDefinition {
        TestDefinition {
            id: id.to_string(),
            test_name: format!("Test {}", id),
            duration_in_seconds: Some(60),
            positive_marks: None,
            negative_marks: None,
            start_time: None,
            end_time: None,
            sections: vec![],
        }
    }

    fn series() -> TestSeries {
        TestSeries {
            id: "series-1".to_string(),
            name: "Mock Series".to_string(),
            free_quota: Some(2),
            tests: vec![test_def("t-1"), test_def("t-2"), test_def("t-3")],
        }
    }

    fn user_claims() -> Claims {
        Claims::new("user-1", "student", "s@example.com", UserRole::User, 1)
    }

    fn purchase(expiry: Option<chrono::DateTime<Utc>>) -> Purchase {
        Purchase {
            id: "p-1".to_string(),
            user_id: "user-1".to_string(),
            status: PurchaseStatus::Completed,
            items: vec![PurchaseItem {
                item_kind: ItemKind::TestSeries,
                item_id: "series-1".to_string(),
            }],
            expiry_date: expiry,
        }
    }

    #[tokio::test]
    async fn free_quota_positions_need_no_entitlement() {
        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering().never();
        let service = AccessService::new(Arc::new(repo));

        let decision = service
            .can_start(&user_claims(), &series(), "t-1")
            .await
            .expect("decision");
        assert!(decision.allowed);

        let decision = service
            .can_start(&user_claims(), &series(), "t-2")
            .await
            .expect("decision");
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn paid_position_without_purchase_is_denied() {
        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering()
            .with(eq("user-1"), eq(ItemKind::TestSeries), eq("series-1"))
            .returning(|_, _, _| Ok(None));
        let service = AccessService::new(Arc::new(repo));

        let decision = service
            .can_start(&user_claims(), &series(), "t-3")
            .await
            .expect("decision");
        assert!(!decision.allowed);
        assert!(decision.reason.is_some());
    }

    #[tokio::test]
    async fn unlimited_entitlement_allows_regardless_of_time() {
        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering()
            .returning(|_, _, _| Ok(Some(purchase(None))));
        let service = AccessService::new(Arc::new(repo));

        let decision = service
            .can_start(&user_claims(), &series(), "t-3")
            .await
            .expect("decision");
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn expired_entitlement_is_denied() {
        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering()
            .returning(|_, _, _| Ok(Some(purchase(Some(Utc::now() - Duration::days(1))))));
        let service = AccessService::new(Arc::new(repo));

        let decision = service
            .can_start(&user_claims(), &series(), "t-3")
            .await
            .expect("decision");
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Your access to this test series has expired")
        );
    }

    #[tokio::test]
    async fn purchase_covering_other_items_does_not_unlock_the_series() {
        // One item matches the kind, another matches the id, but no single
        // item covers (TestSeries, series-1).
        let cross_item_purchase = Purchase {
            id: "p-2".to_string(),
            user_id: "user-1".to_string(),
            status: PurchaseStatus::Completed,
            items: vec![
                PurchaseItem {
                    item_kind: ItemKind::Publication,
                    item_id: "series-1".to_string(),
                },
                PurchaseItem {
                    item_kind: ItemKind::TestSeries,
                    item_id: "other-series".to_string(),
                },
            ],
            expiry_date: None,
        };

        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering()
            .returning(move |_, _, _| Ok(Some(cross_item_purchase.clone())));
        let service = AccessService::new(Arc::new(repo));

        let decision = service
            .can_start(&user_claims(), &series(), "t-3")
            .await
            .expect("decision");
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("You do not have access to this test series")
        );
    }

    #[tokio::test]
    async fn admin_bypasses_entitlement() {
        let mut repo = MockPurchaseRepository::new();
        repo.expect_find_completed_covering().never();
        let service = AccessService::new(Arc::new(repo));

        let admin = Claims::new("admin-1", "admin", "a@example.com", UserRole::Admin, 1);
        let decision = service
            .can_start(&admin, &series(), "t-3")
            .await
            .expect("decision");
        assert!(decision.allowed);
    }
}
