use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::catalog::{DesignRequest, ProductCatalogEntry, SyncStatus};
use crate::store::{CatalogStore, DesignRequestStore};

pub struct ScyllaCatalogStore {
    session: Arc<Session>,
}

impl ScyllaCatalogStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    async fn sku_for_provider_product(&self, provider_product_id: &str) -> Result<Option<String>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT sku FROM catalog_by_provider_product WHERE provider_product_id = ?",
                (provider_product_id,),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };
        Ok(rows_result.maybe_first_row::<(String,)>()?.map(|(sku,)| sku))
    }
}

#[async_trait]
impl CatalogStore for ScyllaCatalogStore {
    async fn product_by_provider_id(&self, provider_product_id: &str) -> Result<Option<ProductCatalogEntry>> {
        match self.sku_for_provider_product(provider_product_id).await? {
            Some(sku) => self.listing_by_sku(&sku).await,
            None => Ok(None),
        }
    }

    async fn listing_by_sku(&self, sku: &str) -> Result<Option<ProductCatalogEntry>> {
        let result = self
            .session
            .query_unpaged("SELECT document FROM catalog_products WHERE sku = ?", (sku,))
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };
        match rows_result.maybe_first_row::<(String,)>()? {
            Some((document,)) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    async fn upsert_by_sku(&self, entry: &ProductCatalogEntry) -> Result<()> {
        let document = serde_json::to_string(entry)?;
        self.session
            .query_unpaged(
                "INSERT INTO catalog_products (sku, provider_product_id, sync_status, document, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    &entry.sku,
                    &entry.provider_product_id,
                    entry.sync_status.as_str(),
                    document,
                    Utc::now(),
                ),
            )
            .await?;
        self.session
            .query_unpaged(
                "INSERT INTO catalog_by_provider_product (provider_product_id, sku) VALUES (?, ?)",
                (&entry.provider_product_id, &entry.sku),
            )
            .await?;

        tracing::debug!(sku = %entry.sku, provider_product_id = %entry.provider_product_id, "Catalog listing upserted");
        Ok(())
    }

    async fn set_sync_status(&self, provider_product_id: &str, status: SyncStatus) -> Result<bool> {
        let Some(mut entry) = self.product_by_provider_id(provider_product_id).await? else {
            return Ok(false);
        };
        entry.sync_status = status;
        entry.updated_at = Utc::now();

        let document = serde_json::to_string(&entry)?;
        self.session
            .query_unpaged(
                "UPDATE catalog_products SET sync_status = ?, document = ?, updated_at = ? WHERE sku = ?",
                (status.as_str(), document, entry.updated_at, &entry.sku),
            )
            .await?;
        Ok(true)
    }
}

pub struct ScyllaDesignRequestStore {
    session: Arc<Session>,
}

impl ScyllaDesignRequestStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DesignRequestStore for ScyllaDesignRequestStore {
    async fn get(&self, id: Uuid) -> Result<Option<DesignRequest>> {
        let result = self
            .session
            .query_unpaged("SELECT document FROM design_requests WHERE id = ?", (id,))
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };
        match rows_result.maybe_first_row::<(String,)>()? {
            Some((document,)) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: &DesignRequest) -> Result<()> {
        let document = serde_json::to_string(request)?;
        self.session
            .query_unpaged(
                "INSERT INTO design_requests (id, status, document, updated_at) VALUES (?, ?, ?, ?)",
                (request.id, request.status.as_str(), document, Utc::now()),
            )
            .await?;
        Ok(())
    }
}
