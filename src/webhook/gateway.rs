use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::order::{
    Address, Charge, ChargeKind, CommandOutcome, CustomerSnapshot, NewOrderItem, NewShipment,
    OpenOrder, OpenOutcome, OrderCommand, OrderCommandHandler,
};
use crate::domain::catalog::SyncStatus;
use crate::domain::pricing::{from_cents, ExchangeRateProvider, RateSnapshot};
use crate::metrics::Metrics;
use crate::store::{CatalogStore, DeadLetter, DeadLetterStore};

use super::envelope::{self, ProviderEvent, ProviderOrder, ProviderOrderUpdate, ProviderShipment};
use super::signature::{self, SignatureCheck};

// ============================================================================
// Webhook Ingestion Gateway
// ============================================================================
//
// verify signature -> parse envelope -> dispatch -> acknowledge
//
// Only two outcomes reach the provider as errors: a bad signature (401) and
// a delivery we could not finish (5xx, so the provider retries). Unknown
// events, unknown orders and refused transitions are acknowledged.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Webhook signature rejected: {0}")]
    Unauthorized(&'static str),

    #[error("Failed to process {event_type} for {resource_id}: {source:#}")]
    Processing {
        event_type: String,
        resource_id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Processed,
    /// Acknowledged without a state change
    Ignored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: String,
    pub disposition: Disposition,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub webhook_secret: Option<String>,
    /// Currency of provider costs when the payload does not name one
    pub provider_currency: String,
    /// Currency orders are priced in
    pub local_currency: String,
}

pub struct WebhookGateway {
    orders: Arc<OrderCommandHandler>,
    catalog: Arc<dyn CatalogStore>,
    rates: Arc<dyn ExchangeRateProvider>,
    dead_letters: Arc<dyn DeadLetterStore>,
    metrics: Arc<Metrics>,
    settings: GatewaySettings,
}

impl WebhookGateway {
    pub fn new(
        orders: Arc<OrderCommandHandler>,
        catalog: Arc<dyn CatalogStore>,
        rates: Arc<dyn ExchangeRateProvider>,
        dead_letters: Arc<dyn DeadLetterStore>,
        metrics: Arc<Metrics>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            orders,
            catalog,
            rates,
            dead_letters,
            metrics,
            settings,
        }
    }

    pub async fn ingest(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookAck, WebhookError> {
        if let SignatureCheck::Invalid(reason) =
            signature::verify(self.settings.webhook_secret.as_deref(), body, signature)
        {
            tracing::warn!(reason = reason, "🚫 Rejected webhook with invalid signature");
            self.metrics.record_signature_failure();
            return Err(WebhookError::Unauthorized(reason));
        }

        let event = envelope::parse(body);
        let event_type = event.event_type().to_string();
        let resource_id = event.resource_id().to_string();
        let started = Instant::now();

        tracing::debug!(event_type = %event_type, resource_id = %resource_id, "Webhook received");

        let result = self.dispatch(event).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(disposition) => {
                self.metrics.record_webhook(&event_type, elapsed, true);
                if let Disposition::Ignored(reason) = &disposition {
                    tracing::info!(
                        event_type = %event_type,
                        resource_id = %resource_id,
                        reason = %reason,
                        "Webhook acknowledged without changes"
                    );
                }
                Ok(WebhookAck {
                    received: event_type,
                    disposition,
                })
            }
            Err(e) => {
                self.metrics.record_webhook(&event_type, elapsed, false);
                tracing::error!(
                    event_type = %event_type,
                    resource_id = %resource_id,
                    error = %format!("{:#}", e),
                    "❌ Webhook processing failed"
                );

                let payload = String::from_utf8_lossy(body);
                let letter = DeadLetter::new(&event_type, &resource_id, &payload, &format!("{:#}", e));
                match self.dead_letters.record(letter).await {
                    Ok(()) => self.metrics.record_dead_letter(&event_type),
                    Err(dl_err) => tracing::error!(error = %dl_err, "Failed to record dead letter"),
                }

                Err(WebhookError::Processing {
                    event_type,
                    resource_id,
                    source: e,
                })
            }
        }
    }

    async fn dispatch(&self, event: ProviderEvent) -> anyhow::Result<Disposition> {
        match event {
            ProviderEvent::OrderCreated { order_id, order } => self.on_order_created(order_id, order).await,
            ProviderEvent::OrderUpdated { order_id, update } => self.on_order_updated(&order_id, update).await,
            ProviderEvent::OrderSentToProduction { order_id } => {
                self.run(&order_id, OrderCommand::SendToProduction).await
            }
            ProviderEvent::ShipmentCreated { order_id, shipment } => {
                let shipment = Self::new_shipment(shipment, false);
                self.run(&order_id, OrderCommand::RecordShipment(shipment)).await
            }
            ProviderEvent::ShipmentDelivered { order_id, shipment } => {
                let shipment = Self::new_shipment(shipment, true);
                self.run(&order_id, OrderCommand::MarkDelivered(shipment)).await
            }
            ProviderEvent::ProductDeleted { product_id } => {
                self.sync_catalog(&product_id, SyncStatus::Deleted).await
            }
            ProviderEvent::ProductPublishStarted { product_id } => {
                self.sync_catalog(&product_id, SyncStatus::Publishing).await
            }
            ProviderEvent::Unknown { event_type, reason, .. } => {
                tracing::warn!(event_type = %event_type, reason = %reason, "Unhandled provider event");
                Ok(Disposition::Ignored(format!("unhandled event: {}", reason)))
            }
        }
    }

    async fn run(&self, order_id: &str, command: OrderCommand) -> anyhow::Result<Disposition> {
        let outcome = self.orders.execute(order_id, command).await?;
        Ok(match outcome {
            CommandOutcome::Applied { .. } => Disposition::Processed,
            CommandOutcome::Unchanged(_) => Disposition::Ignored("no change".to_string()),
            CommandOutcome::Rejected { reason, .. } => Disposition::Ignored(reason),
            CommandOutcome::UnknownOrder => {
                tracing::warn!(provider_order_id = %order_id, "Webhook for an order we have no record of");
                Disposition::Ignored("unknown order".to_string())
            }
        })
    }

    async fn on_order_created(&self, order_id: String, order: ProviderOrder) -> anyhow::Result<Disposition> {
        let provider_currency = order
            .currency
            .clone()
            .unwrap_or_else(|| self.settings.provider_currency.clone());
        let rate = self
            .rates
            .current(&provider_currency, &self.settings.local_currency)
            .await
            .context("exchange rate unavailable")?;

        let mut items = Vec::with_capacity(order.line_items.len());
        for line in &order.line_items {
            let Some(entry) = self.catalog.product_by_provider_id(&line.product_id).await? else {
                tracing::warn!(
                    provider_order_id = %order_id,
                    provider_product_id = %line.product_id,
                    "Line references a product missing from the catalog, skipping"
                );
                continue;
            };

            let base_manufacturing_cost = line
                .cost
                .map(from_cents)
                .unwrap_or_else(|| entry.base_manufacturing_cost());

            items.push(NewOrderItem {
                line_id: line.line_id(),
                provider_product_id: line.product_id.clone(),
                variant_id: line.variant_id,
                sku: line.metadata.sku.clone().unwrap_or_else(|| entry.sku.clone()),
                quantity: line.quantity,
                base_manufacturing_cost,
                manufacturing_currency: provider_currency.clone(),
                selling_price: entry.selling_price,
                commission_rate: entry.commission_rate,
                creator_id: entry.creator_id.clone(),
            });
        }

        if items.is_empty() {
            return Ok(Disposition::Ignored("no line matched the catalog".to_string()));
        }

        let command = self.open_command(order_id, &order, items, rate)?;
        Ok(match self.orders.open(command).await? {
            OpenOutcome::Created(_) => Disposition::Processed,
            OpenOutcome::Duplicate(_) => Disposition::Ignored("duplicate order:created".to_string()),
            OpenOutcome::Rejected(reason) => {
                tracing::warn!(reason = %reason, "Order payload rejected");
                Disposition::Ignored(reason)
            }
        })
    }

    fn open_command(
        &self,
        order_id: String,
        order: &ProviderOrder,
        items: Vec<NewOrderItem>,
        rate: RateSnapshot,
    ) -> anyhow::Result<OpenOrder> {
        let local = |cents: i64| rate.convert(from_cents(cents), &rate.from_currency);
        let now = Utc::now();

        let charges = [
            (ChargeKind::Item, order.total_price),
            (ChargeKind::Shipping, order.total_shipping),
            (ChargeKind::Tax, order.total_tax),
        ]
        .into_iter()
        .filter(|(_, cents)| *cents != 0)
        .map(|(kind, cents)| Charge {
            kind,
            amount: from_cents(cents),
            currency: rate.from_currency.clone(),
            recorded_at: now,
        })
        .collect();

        let address = &order.address_to;
        Ok(OpenOrder {
            provider_order_id: order_id,
            customer: CustomerSnapshot {
                name: format!("{} {}", address.first_name, address.last_name).trim().to_string(),
                email: address.email.clone(),
                phone: address.phone.clone(),
                shipping_address: Address {
                    line1: address.address1.clone(),
                    line2: address.address2.clone(),
                    city: address.city.clone(),
                    region: address.region.clone(),
                    postal_code: address.zip.clone(),
                    country: address.country.clone(),
                },
            },
            items,
            currency: self.settings.local_currency.clone(),
            shipping: local(order.total_shipping)?,
            tax: local(order.total_tax)?,
            discount: local(order.total_discount)?,
            exchange_rate: rate.clone(),
            charges,
            occurred_at: order.created_at.unwrap_or(now),
        })
    }

    async fn on_order_updated(&self, order_id: &str, update: ProviderOrderUpdate) -> anyhow::Result<Disposition> {
        if let Some(cents) = update.refunded_amount.filter(|c| *c > 0) {
            let charge = Charge {
                kind: ChargeKind::Refund,
                amount: from_cents(cents),
                currency: update
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.settings.provider_currency.clone()),
                recorded_at: Utc::now(),
            };
            self.run(order_id, OrderCommand::RecordCharge(charge)).await?;
        }

        self.run(order_id, OrderCommand::ApplyProviderStatus { raw_status: update.status }).await
    }

    fn new_shipment(shipment: ProviderShipment, delivered: bool) -> NewShipment {
        let occurred_at = if delivered {
            shipment.delivered_at.or(shipment.shipped_at)
        } else {
            shipment.shipped_at
        };
        NewShipment {
            carrier: shipment.carrier.code,
            tracking_number: shipment.carrier.tracking_number,
            tracking_url: shipment.carrier.tracking_url,
            line_ids: shipment.line_items,
            occurred_at: occurred_at.unwrap_or_else(Utc::now),
        }
    }

    async fn sync_catalog(&self, product_id: &str, status: SyncStatus) -> anyhow::Result<Disposition> {
        if self.catalog.set_sync_status(product_id, status).await? {
            tracing::info!(provider_product_id = %product_id, status = status.as_str(), "🗂️ Catalog sync status updated");
            Ok(Disposition::Processed)
        } else {
            tracing::warn!(provider_product_id = %product_id, "Product event for a listing we do not have");
            Ok(Disposition::Ignored("unknown product".to_string()))
        }
    }
}
