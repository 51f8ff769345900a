use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of purchasable content kinds. Free-form strings from upstream
/// systems are normalized into this enum at the boundary; the exam engine
/// never sees raw item-type strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    OnlineCourse,
    TestSeries,
    Publication,
}

impl ItemKind {
    /// Accepts the spellings historically produced by the storefront.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw {
            "online_course" | "OnlineCourse" | "ONLINE_COURSE" => Some(ItemKind::OnlineCourse),
            "test_series" | "TestSeries" | "TEST_SERIES" => Some(ItemKind::TestSeries),
            "publication" | "Publication" | "PUBLICATION" => Some(ItemKind::Publication),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::OnlineCourse => "online_course",
            ItemKind::TestSeries => "test_series",
            ItemKind::Publication => "publication",
        }
    }

    /// Every spelling a stored document may carry for this kind, for queries
    /// that must match records written before normalization existed.
    pub fn stored_spellings(&self) -> [&'static str; 3] {
        match self {
            ItemKind::OnlineCourse => ["online_course", "OnlineCourse", "ONLINE_COURSE"],
            ItemKind::TestSeries => ["test_series", "TestSeries", "TEST_SERIES"],
            ItemKind::Publication => ["publication", "Publication", "PUBLICATION"],
        }
    }
}

impl Serialize for ItemKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ItemKind::normalize(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown item kind '{}'", raw)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum PurchaseStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PurchaseItem {
    pub item_kind: ItemKind,
    pub item_id: String,
}

/// Entitlement record written by the payment subsystem; read-only here.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub status: PurchaseStatus,
    pub items: Vec<PurchaseItem>,
    /// Absent means unlimited validity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Purchase {
    pub fn covers(&self, kind: ItemKind, item_id: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.item_kind == kind && item.item_id == item_id)
    }

    /// Completed and not expired. A missing expiry date means the purchase
    /// never expires.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PurchaseStatus::Completed
            && self.expiry_date.map(|expiry| expiry > now).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn purchase(status: PurchaseStatus, expiry: Option<DateTime<Utc>>) -> Purchase {
        Purchase {
            id: "p-1".to_string(),
            user_id: "user-1".to_string(),
            status,
            items: vec![PurchaseItem {
                item_kind: ItemKind::TestSeries,
                item_id: "series-1".to_string(),
            }],
            expiry_date: expiry,
        }
    }

    #[test]
    fn unlimited_entitlement_always_valid() {
        let p = purchase(PurchaseStatus::Completed, None);
        assert!(p.is_valid_at(Utc::now()));
        assert!(p.is_valid_at(Utc::now() + Duration::days(10_000)));
    }

    #[test]
    fn expired_entitlement_never_valid() {
        let p = purchase(
            PurchaseStatus::Completed,
            Some(Utc::now() - Duration::days(1)),
        );
        assert!(!p.is_valid_at(Utc::now()));
    }

    #[test]
    fn pending_purchase_is_not_an_entitlement() {
        let p = purchase(PurchaseStatus::Pending, None);
        assert!(!p.is_valid_at(Utc::now()));
    }

    #[test]
    fn covers_matches_kind_and_id() {
        let p = purchase(PurchaseStatus::Completed, None);
        assert!(p.covers(ItemKind::TestSeries, "series-1"));
        assert!(!p.covers(ItemKind::TestSeries, "series-2"));
        assert!(!p.covers(ItemKind::Publication, "series-1"));
    }

    #[test]
    fn normalizes_historic_item_type_spellings() {
        assert_eq!(ItemKind::normalize("test_series"), Some(ItemKind::TestSeries));
        assert_eq!(ItemKind::normalize("TestSeries"), Some(ItemKind::TestSeries));
        assert_eq!(ItemKind::normalize("bogus"), None);
    }

    #[test]
    fn deserializes_records_with_historic_spellings() {
        let kind: ItemKind = serde_json::from_str("\"TestSeries\"").unwrap();
        assert_eq!(kind, ItemKind::TestSeries);

        // Written back in the canonical spelling.
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"test_series\"");

        assert!(serde_json::from_str::<ItemKind>("\"bogus\"").is_err());
    }
}
