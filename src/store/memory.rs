use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::catalog::{DesignRequest, ProductCatalogEntry, SyncStatus};
use crate::domain::earnings::{CreatorEarnings, EarningsLedger, LedgerPosting};
use crate::domain::order::Order;
use super::{CatalogStore, DeadLetter, DeadLetterStore, DesignRequestStore, OrderStore};

// ============================================================================
// In-Memory Stores
// ============================================================================
//
// Same guarantees as the Scylla stores, enforced by holding one lock for the
// whole check-and-write. No lock is held across an await on anything else.
//
// ============================================================================

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> anyhow::Result<bool> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.provider_order_id) {
            return Ok(false);
        }
        orders.insert(order.provider_order_id.clone(), order.clone());
        Ok(true)
    }

    async fn load(&self, provider_order_id: &str) -> anyhow::Result<Option<Order>> {
        Ok(self.orders.read().await.get(provider_order_id).cloned())
    }

    async fn compare_and_swap(&self, order: &Order, expected_version: i64) -> anyhow::Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.provider_order_id) {
            Some(stored) if stored.version == expected_version => {
                *stored = order.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
struct LedgerState {
    creators: HashMap<String, CreatorEarnings>,
    applied: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryEarningsLedger {
    state: Mutex<LedgerState>,
}

impl MemoryEarningsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn applied_count(&self) -> usize {
        self.state.lock().await.applied.len()
    }
}

#[async_trait]
impl EarningsLedger for MemoryEarningsLedger {
    async fn apply(&self, posting: &LedgerPosting) -> anyhow::Result<bool> {
        let mut state = self.state.lock().await;
        if !state.applied.insert(posting.id) {
            return Ok(false);
        }
        state
            .creators
            .entry(posting.creator_id.clone())
            .or_insert_with(|| CreatorEarnings::empty(posting.creator_id.clone()))
            .apply(posting);
        Ok(true)
    }

    async fn earnings(&self, creator_id: &str) -> anyhow::Result<CreatorEarnings> {
        Ok(self
            .state
            .lock()
            .await
            .creators
            .get(creator_id)
            .cloned()
            .unwrap_or_else(|| CreatorEarnings::empty(creator_id)))
    }
}

#[derive(Default)]
pub struct MemoryCatalogStore {
    by_sku: RwLock<HashMap<String, ProductCatalogEntry>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_sku.read().await.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn product_by_provider_id(&self, provider_product_id: &str) -> anyhow::Result<Option<ProductCatalogEntry>> {
        Ok(self
            .by_sku
            .read()
            .await
            .values()
            .find(|e| e.provider_product_id == provider_product_id)
            .cloned())
    }

    async fn listing_by_sku(&self, sku: &str) -> anyhow::Result<Option<ProductCatalogEntry>> {
        Ok(self.by_sku.read().await.get(sku).cloned())
    }

    async fn upsert_by_sku(&self, entry: &ProductCatalogEntry) -> anyhow::Result<()> {
        self.by_sku.write().await.insert(entry.sku.clone(), entry.clone());
        Ok(())
    }

    async fn set_sync_status(&self, provider_product_id: &str, status: SyncStatus) -> anyhow::Result<bool> {
        let mut by_sku = self.by_sku.write().await;
        let mut found = false;
        for entry in by_sku.values_mut().filter(|e| e.provider_product_id == provider_product_id) {
            entry.sync_status = status;
            entry.updated_at = chrono::Utc::now();
            found = true;
        }
        Ok(found)
    }
}

#[derive(Default)]
pub struct MemoryDesignRequestStore {
    requests: RwLock<HashMap<Uuid, DesignRequest>>,
}

impl MemoryDesignRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DesignRequestStore for MemoryDesignRequestStore {
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<DesignRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn save(&self, request: &DesignRequest) -> anyhow::Result<()> {
        self.requests.write().await.insert(request.id, request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDeadLetterStore {
    letters: RwLock<Vec<DeadLetter>>,
}

impl MemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for MemoryDeadLetterStore {
    async fn record(&self, letter: DeadLetter) -> anyhow::Result<()> {
        let mut letters = self.letters.write().await;
        let existing = letters
            .iter_mut()
            .find(|l| l.event_type == letter.event_type && l.resource_id == letter.resource_id);
        match existing {
            Some(stored) => {
                stored.failure_count += 1;
                stored.payload = letter.payload;
                stored.error = letter.error;
                stored.last_failed_at = letter.last_failed_at;
            }
            None => letters.push(letter),
        }
        Ok(())
    }

    async fn list(&self, limit: usize) -> anyhow::Result<Vec<DeadLetter>> {
        Ok(self.letters.read().await.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_ledger_ignores_replayed_posting() {
        let ledger = MemoryEarningsLedger::new();
        let posting = LedgerPosting::accrue("POD-1", "creator-1", Decimal::new(6300, 2), Decimal::new(15000, 2));

        assert!(ledger.apply(&posting).await.unwrap());
        assert!(!ledger.apply(&posting).await.unwrap());

        let earnings = ledger.earnings("creator-1").await.unwrap();
        assert_eq!(earnings.pending_earnings, Decimal::new(6300, 2));
        assert_eq!(earnings.total_orders, 1);
    }

    #[tokio::test]
    async fn test_unknown_creator_has_empty_earnings() {
        let ledger = MemoryEarningsLedger::new();
        let earnings = ledger.earnings("nobody").await.unwrap();
        assert_eq!(earnings, CreatorEarnings::empty("nobody"));
    }

    #[tokio::test]
    async fn test_dead_letters_collapse_by_resource() {
        let store = MemoryDeadLetterStore::new();
        store.record(DeadLetter::new("order:created", "o-1", "{}", "store down")).await.unwrap();
        store.record(DeadLetter::new("order:created", "o-1", "{}", "store still down")).await.unwrap();
        store.record(DeadLetter::new("order:updated", "o-1", "{}", "boom")).await.unwrap();

        let letters = store.list(10).await.unwrap();
        assert_eq!(letters.len(), 2);
        assert_eq!(letters[0].failure_count, 2);
        assert_eq!(letters[0].error, "store still down");
    }
}
