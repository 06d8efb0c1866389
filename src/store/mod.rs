use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{DesignRequest, ProductCatalogEntry, SyncStatus};
use crate::domain::order::Order;

pub mod memory;
pub mod scylla_db;

// ============================================================================
// Storage Seams
// ============================================================================
//
// Every cross-request guarantee is delegated to the store:
// - orders are created with insert-if-absent keyed on the provider order id
// - order updates are compare-and-set on the stored version
// - earnings are atomic increments, deduplicated by posting id
//
// Two implementations: `memory` (dev/tests) and `scylla_db`.
//
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns `false` when an order with the same provider id already exists.
    async fn insert_if_absent(&self, order: &Order) -> anyhow::Result<bool>;

    async fn load(&self, provider_order_id: &str) -> anyhow::Result<Option<Order>>;

    /// Replace the stored order when its version still equals
    /// `expected_version`. `order.version` must already be the new version.
    async fn compare_and_swap(&self, order: &Order, expected_version: i64) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product_by_provider_id(&self, provider_product_id: &str) -> anyhow::Result<Option<ProductCatalogEntry>>;

    async fn listing_by_sku(&self, sku: &str) -> anyhow::Result<Option<ProductCatalogEntry>>;

    /// Idempotent: writing the same SKU twice leaves one listing.
    async fn upsert_by_sku(&self, entry: &ProductCatalogEntry) -> anyhow::Result<()>;

    /// Returns `false` when no listing mirrors the provider product.
    async fn set_sync_status(&self, provider_product_id: &str, status: SyncStatus) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait DesignRequestStore: Send + Sync {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<DesignRequest>>;

    async fn save(&self, request: &DesignRequest) -> anyhow::Result<()>;
}

/// A webhook delivery that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub event_type: String,
    pub resource_id: String,
    pub payload: String,
    pub error: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(event_type: &str, resource_id: &str, payload: &str, error: &str) -> Self {
        let now = Utc::now();
        Self {
            event_type: event_type.to_string(),
            resource_id: resource_id.to_string(),
            payload: payload.to_string(),
            error: error.to_string(),
            failure_count: 1,
            first_failed_at: now,
            last_failed_at: now,
        }
    }
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Record a failure. Repeated failures of the same `(event_type,
    /// resource_id)` bump the count and keep the latest payload and error.
    async fn record(&self, letter: DeadLetter) -> anyhow::Result<()>;

    async fn list(&self, limit: usize) -> anyhow::Result<Vec<DeadLetter>>;
}
