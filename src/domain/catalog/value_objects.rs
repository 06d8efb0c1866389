use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::from_cents;

// ============================================================================
// Catalog Value Objects
// ============================================================================

/// Provider-side state of a catalog listing. The only catalog field the
/// order pipeline ever writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Product exists on the provider, not yet published externally
    Created,
    /// Provider has started publishing
    Publishing,
    Synced,
    /// Deleted on the provider side
    Deleted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Created => "created",
            SyncStatus::Publishing => "publishing",
            SyncStatus::Synced => "synced",
            SyncStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(SyncStatus::Created),
            "publishing" => Some(SyncStatus::Publishing),
            "synced" => Some(SyncStatus::Synced),
            "deleted" => Some(SyncStatus::Deleted),
            _ => None,
        }
    }
}

/// A local listing mirroring one provider product.
///
/// Read once per order line; the line keeps its own copy of the cost and
/// commission rate, so later edits here never touch existing orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCatalogEntry {
    /// `POD-<design request id>`; the idempotency key of the listing write
    pub sku: String,
    pub design_request_id: Uuid,
    pub store_product_id: Uuid,
    pub provider_product_id: String,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    /// Local currency
    pub selling_price: Decimal,
    /// Cheapest enabled variant, in cents of `provider_currency`
    pub base_cost_cents: i64,
    pub provider_currency: String,
    pub commission_rate: Decimal,
    pub creator_id: String,
    pub subcategory: Option<String>,
    pub sync_status: SyncStatus,
    pub store_url: String,
    pub updated_at: DateTime<Utc>,
}

impl ProductCatalogEntry {
    pub fn sku_for(design_request_id: Uuid) -> String {
        format!("POD-{}", design_request_id)
    }

    pub fn base_manufacturing_cost(&self) -> Decimal {
        from_cents(self.base_cost_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_is_keyed_on_design_request() {
        let id = Uuid::new_v4();
        assert_eq!(ProductCatalogEntry::sku_for(id), format!("POD-{}", id));
        assert_eq!(ProductCatalogEntry::sku_for(id), ProductCatalogEntry::sku_for(id));
    }

    #[test]
    fn test_sync_status_names() {
        for status in [
            SyncStatus::Created,
            SyncStatus::Publishing,
            SyncStatus::Synced,
            SyncStatus::Deleted,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
    }
}
