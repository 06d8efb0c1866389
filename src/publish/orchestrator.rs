use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::catalog::{DesignRequest, ProductCatalogEntry, PublishStatus, SyncStatus};
use crate::domain::pricing::{from_cents, retail_price_cents, ExchangeRateProvider};
use crate::metrics::Metrics;
use crate::provider::{NewProduct, NewVariant, ProviderClient};
use crate::store::{CatalogStore, DesignRequestStore};
use crate::utils::{retry_with_backoff, RetryConfig};

use super::PublishError;

// ============================================================================
// Publish Orchestrator
// ============================================================================
//
// 1. upload design asset          fatal, nothing created
// 2. create provider product      fatal, nothing created
// 3. wait for mockups             falls back to placeholder images
// 4. publish externally           logged, product stays created-not-published
// 5. upsert catalog listing       retried; on exhaustion -> catalog_pending
// 6. mark request published
//
// Progress is saved on the design request after step 2, so a second call
// for a `product_created` / `catalog_pending` request resumes at step 3
// instead of creating another provider product. No compensation runs.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub shop_id: u64,
    /// How long the provider gets to render mockups before we look
    pub mockup_wait: Duration,
    pub store_base_url: String,
    pub provider_currency: String,
    pub local_currency: String,
    pub catalog_retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub pod_product_id: Uuid,
    pub store_product_id: Uuid,
    pub provider_product_id: String,
    pub store_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishStatusView {
    pub pod_product_id: Uuid,
    pub status: PublishStatus,
    pub sync_status: Option<SyncStatus>,
    pub provider_product_id: Option<String>,
    pub store_product_id: Option<Uuid>,
    pub store_url: Option<String>,
    pub externally_published: bool,
    pub last_error: Option<String>,
}

pub struct PublishOrchestrator {
    provider: Arc<dyn ProviderClient>,
    designs: Arc<dyn DesignRequestStore>,
    catalog: Arc<dyn CatalogStore>,
    rates: Arc<dyn ExchangeRateProvider>,
    metrics: Arc<Metrics>,
    settings: PublishSettings,
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Releases the in-flight slot for a design request when the saga ends.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<Uuid>>, id: Uuid) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(id).then(|| Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.id);
    }
}

impl PublishOrchestrator {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        designs: Arc<dyn DesignRequestStore>,
        catalog: Arc<dyn CatalogStore>,
        rates: Arc<dyn ExchangeRateProvider>,
        metrics: Arc<Metrics>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            provider,
            designs,
            catalog,
            rates,
            metrics,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub async fn publish(&self, id: Uuid, subcategory: Option<String>) -> Result<PublishOutcome, PublishError> {
        let _slot = InFlight::claim(&self.in_flight, id).ok_or(PublishError::InProgress(id))?;

        let mut request = self.designs.get(id).await?.ok_or(PublishError::NotFound(id))?;
        if request.status == PublishStatus::Published {
            return Err(PublishError::AlreadyPublished(id));
        }
        if subcategory.is_some() {
            request.subcategory = subcategory;
        }

        tracing::info!(
            design_request_id = %id,
            creator_id = %request.creator_id,
            status = %request.status,
            "🚀 Publishing design request"
        );

        let provider_product_id = match request.status {
            PublishStatus::Draft => self.create_provider_product(&mut request).await?,
            PublishStatus::ProductCreated | PublishStatus::CatalogPending => {
                self.metrics.record_publish_step("upload_asset", "skipped");
                self.metrics.record_publish_step("create_product", "skipped");
                match request.provider_product_id.clone() {
                    Some(product_id) => product_id,
                    // progress was recorded without linkage; start over
                    None => self.create_provider_product(&mut request).await?,
                }
            }
            PublishStatus::Published => return Err(PublishError::AlreadyPublished(id)),
        };

        self.collect_mockups(&mut request, &provider_product_id).await;
        self.publish_externally(&mut request, &provider_product_id).await;
        self.designs.save(&request).await?;

        let entry = self.write_listing(&mut request, &provider_product_id).await?;

        request.status = PublishStatus::Published;
        request.store_url = Some(entry.store_url.clone());
        request.published_at = Some(Utc::now());
        request.last_error = None;
        self.designs.save(&request).await?;
        self.metrics.record_publish_step("mark_published", "ok");

        tracing::info!(
            design_request_id = %id,
            provider_product_id = %provider_product_id,
            store_product_id = %entry.store_product_id,
            "✅ Design request published"
        );

        Ok(PublishOutcome {
            pod_product_id: id,
            store_product_id: entry.store_product_id,
            provider_product_id,
            store_url: entry.store_url,
        })
    }

    pub async fn status(&self, id: Uuid) -> Result<PublishStatusView, PublishError> {
        let request = self.designs.get(id).await?.ok_or(PublishError::NotFound(id))?;
        let listing = self
            .catalog
            .listing_by_sku(&ProductCatalogEntry::sku_for(id))
            .await?;

        Ok(PublishStatusView {
            pod_product_id: id,
            status: request.status,
            sync_status: listing.as_ref().map(|l| l.sync_status),
            provider_product_id: request.provider_product_id,
            store_product_id: request.store_product_id,
            store_url: listing.map(|l| l.store_url).or(request.store_url),
            externally_published: request.externally_published,
            last_error: request.last_error,
        })
    }

    /// Steps 1 and 2. Any failure leaves the request in `draft`.
    async fn create_provider_product(&self, request: &mut DesignRequest) -> Result<String, PublishError> {
        let design_url = request
            .design_image_url
            .clone()
            .ok_or(PublishError::MissingDesign(request.id))?;
        if request.base_cost_cents().is_none() {
            return Err(PublishError::NoEnabledVariants(request.id));
        }

        let file_name = format!("design-{}.png", request.id);
        let asset = match self.provider.upload_asset(&file_name, &design_url).await {
            Ok(asset) => {
                self.metrics.record_publish_step("upload_asset", "ok");
                asset
            }
            Err(e) => return Err(self.fail_fatal(request, "upload_asset", e).await),
        };

        let variants = request
            .variants
            .iter()
            .map(|v| NewVariant {
                id: v.variant_id,
                price: retail_price_cents(v.cost_cents, request.markup_percent),
                is_enabled: v.enabled,
            })
            .collect();
        let product = NewProduct::front_print(
            &request.title,
            &request.description,
            request.blueprint_id,
            request.print_provider_id,
            variants,
            &asset.id,
        );

        let created = match self.provider.create_product(self.settings.shop_id, &product).await {
            Ok(created) => {
                self.metrics.record_publish_step("create_product", "ok");
                created
            }
            Err(e) => return Err(self.fail_fatal(request, "create_product", e).await),
        };

        request.provider_asset_id = Some(asset.id);
        request.provider_product_id = Some(created.id.clone());
        request.status = PublishStatus::ProductCreated;
        request.last_error = None;
        self.record_product_created(request).await?;

        tracing::info!(
            design_request_id = %request.id,
            provider_product_id = %created.id,
            "📦 Provider product created"
        );
        Ok(created.id)
    }

    /// Persist the provider linkage. A request left in `draft` here would
    /// create a second provider product on the next call.
    async fn record_product_created(&self, request: &DesignRequest) -> Result<(), PublishError> {
        let (designs, metrics) = (&self.designs, &self.metrics);
        let saved = retry_with_backoff(self.settings.catalog_retry.clone(), "record_product_created", move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("record_product_created");
            }
            designs.save(request)
        })
        .await
        .into_result();

        saved.map_err(|e| {
            let provider_product_id = request.provider_product_id.clone().unwrap_or_default();
            self.metrics.record_retry_exhausted("record_product_created");
            tracing::error!(
                design_request_id = %request.id,
                provider_product_id = %provider_product_id,
                error = %format!("{:#}", e),
                "❌ Provider product created but not recorded; link it by hand before retrying"
            );
            PublishError::Unrecorded {
                id: request.id,
                provider_product_id,
            }
        })
    }

    async fn fail_fatal(
        &self,
        request: &mut DesignRequest,
        step: &'static str,
        source: crate::provider::ProviderError,
    ) -> PublishError {
        self.metrics.record_publish_step(step, "failed");
        tracing::error!(design_request_id = %request.id, step = step, error = %source, "❌ Publish step failed");

        request.last_error = Some(format!("{}: {}", step, source));
        if let Err(e) = self.designs.save(request).await {
            tracing::error!(design_request_id = %request.id, error = %e, "Failed to record publish error");
        }
        PublishError::Provider { step, source }
    }

    /// Step 3. Never fails the saga.
    async fn collect_mockups(&self, request: &mut DesignRequest, provider_product_id: &str) {
        if !request.mockup_images.is_empty() {
            self.metrics.record_publish_step("mockups", "skipped");
            return;
        }

        tokio::time::sleep(self.settings.mockup_wait).await;

        match self.provider.get_product(self.settings.shop_id, provider_product_id).await {
            Ok(product) if !product.images.is_empty() => {
                // default image first
                let mut images = product.images;
                images.sort_by_key(|i| !i.is_default);
                request.mockup_images = images.into_iter().map(|i| i.src).collect();
                self.metrics.record_publish_step("mockups", "ok");
            }
            Ok(_) => {
                tracing::warn!(design_request_id = %request.id, "Mockups not ready, using placeholder images");
                self.metrics.record_publish_step("mockups", "degraded");
            }
            Err(e) => {
                tracing::warn!(
                    design_request_id = %request.id,
                    error = %e,
                    "Could not fetch mockups, using placeholder images"
                );
                self.metrics.record_publish_step("mockups", "degraded");
            }
        }
    }

    /// Step 4. A failure is logged and the product stays unpublished.
    async fn publish_externally(&self, request: &mut DesignRequest, provider_product_id: &str) {
        if request.externally_published {
            self.metrics.record_publish_step("publish_external", "skipped");
            return;
        }

        match self
            .provider
            .publish_product(self.settings.shop_id, provider_product_id)
            .await
        {
            Ok(()) => {
                request.externally_published = true;
                self.metrics.record_publish_step("publish_external", "ok");
            }
            Err(e) => {
                tracing::warn!(
                    design_request_id = %request.id,
                    provider_product_id = %provider_product_id,
                    error = %e,
                    "External publish failed; product stays created but not published"
                );
                request.last_error = Some(format!("publish_external: {}", e));
                self.metrics.record_publish_step("publish_external", "failed");
            }
        }
    }

    /// Local selling price: the explicit one, or the provider retail price
    /// of the cheapest variant converted at the current rate.
    async fn selling_price(&self, request: &DesignRequest) -> Result<Decimal, PublishError> {
        if let Some(price) = request.selling_price {
            return Ok(price);
        }
        let cost_cents = request
            .base_cost_cents()
            .ok_or(PublishError::NoEnabledVariants(request.id))?;
        let retail = from_cents(retail_price_cents(cost_cents, request.markup_percent));
        let rate = self
            .rates
            .current(&self.settings.provider_currency, &self.settings.local_currency)
            .await?;
        Ok(rate.convert(retail, &self.settings.provider_currency)?)
    }

    /// Step 5.
    async fn write_listing(
        &self,
        request: &mut DesignRequest,
        provider_product_id: &str,
    ) -> Result<ProductCatalogEntry, PublishError> {
        let sku = ProductCatalogEntry::sku_for(request.id);
        let existing = self.catalog.listing_by_sku(&sku).await?;

        let store_product_id = request
            .store_product_id
            .or_else(|| existing.as_ref().map(|e| e.store_product_id))
            .unwrap_or_else(Uuid::new_v4);
        if request.store_product_id != Some(store_product_id) {
            // keep the id stable across resumed attempts
            request.store_product_id = Some(store_product_id);
            self.designs.save(request).await?;
        }

        let base_cost_cents = request
            .base_cost_cents()
            .ok_or(PublishError::NoEnabledVariants(request.id))?;
        let sync_status = match (&existing, request.externally_published) {
            (Some(listing), _) if listing.sync_status != SyncStatus::Created => listing.sync_status,
            (_, true) => SyncStatus::Synced,
            (_, false) => SyncStatus::Created,
        };

        let entry = ProductCatalogEntry {
            sku,
            design_request_id: request.id,
            store_product_id,
            provider_product_id: provider_product_id.to_string(),
            title: request.title.clone(),
            description: request.description.clone(),
            images: request.images().to_vec(),
            selling_price: self.selling_price(request).await?,
            base_cost_cents,
            provider_currency: self.settings.provider_currency.clone(),
            commission_rate: request.commission_rate,
            creator_id: request.creator_id.clone(),
            subcategory: request.subcategory.clone(),
            sync_status,
            store_url: format!(
                "{}/products/{}",
                self.settings.store_base_url.trim_end_matches('/'),
                store_product_id
            ),
            updated_at: Utc::now(),
        };

        let (catalog, metrics, listing) = (&self.catalog, &self.metrics, &entry);
        let written = retry_with_backoff(self.settings.catalog_retry.clone(), "catalog_upsert", move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("catalog_upsert");
            }
            catalog.upsert_by_sku(listing)
        })
        .await
        .into_result();

        match written {
            Ok(()) => {
                self.metrics.record_publish_step("catalog_listing", "ok");
                Ok(entry)
            }
            Err(e) => {
                self.metrics.record_publish_step("catalog_listing", "failed");
                self.metrics.record_retry_exhausted("catalog_upsert");
                tracing::error!(
                    design_request_id = %request.id,
                    sku = %entry.sku,
                    error = %format!("{:#}", e),
                    "❌ Catalog listing not written; request left for manual reconciliation"
                );

                request.status = PublishStatus::CatalogPending;
                request.last_error = Some(format!("catalog_listing: {:#}", e));
                self.designs.save(request).await?;
                Err(PublishError::CatalogPending(request.id))
            }
        }
    }
}
