use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::pricing::RateSnapshot;
use super::value_objects::{Charge, CustomerSnapshot};

// ============================================================================
// Order Commands - what the webhook gateway asks of an order
// ============================================================================

/// Everything needed to open an order on first sighting.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub provider_order_id: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<NewOrderItem>,
    /// Local currency
    pub currency: String,
    /// Local-currency amounts, already converted
    pub shipping: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub exchange_rate: RateSnapshot,
    pub charges: Vec<Charge>,
    pub occurred_at: DateTime<Utc>,
}

/// A line resolved against the catalog, before pricing.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub line_id: String,
    pub provider_product_id: String,
    pub variant_id: Option<u64>,
    pub sku: String,
    pub quantity: u32,
    /// Unit cost in `manufacturing_currency`
    pub base_manufacturing_cost: Decimal,
    pub manufacturing_currency: String,
    /// Unit selling price in local currency
    pub selling_price: Decimal,
    /// Snapshotted from the catalog entry
    pub commission_rate: Decimal,
    pub creator_id: String,
}

#[derive(Debug, Clone)]
pub struct NewShipment {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub line_ids: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum OrderCommand {
    /// `order:updated` with the provider's own status word
    ApplyProviderStatus { raw_status: String },
    /// `order:sent-to-production`
    SendToProduction,
    /// `shipment:created`
    RecordShipment(NewShipment),
    /// `shipment:delivered`
    MarkDelivered(NewShipment),
    /// Provider-reported money movement after creation. A refund carries
    /// the running total refunded so far, not the latest refund alone.
    RecordCharge(Charge),
    /// Ledger postings have been applied and can be dropped from the order
    FlushPostings { posting_ids: Vec<Uuid> },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::ApplyProviderStatus { .. } => "apply_provider_status",
            OrderCommand::SendToProduction => "send_to_production",
            OrderCommand::RecordShipment(_) => "record_shipment",
            OrderCommand::MarkDelivered(_) => "mark_delivered",
            OrderCommand::RecordCharge(_) => "record_charge",
            OrderCommand::FlushPostings { .. } => "flush_postings",
        }
    }
}
