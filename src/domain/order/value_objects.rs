use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::CommissionSplit;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Canonical order lifecycle, independent of any provider vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "in_production" => Some(OrderStatus::InProduction),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// Customer details copied at order creation. Never refreshed from the live
/// customer record: a dispatched label must not change underneath us.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub shipping_address: Address,
}

/// A line item with its money split frozen at creation.
///
/// `base_manufacturing_cost`, `base_cost` and `selling_price` are unit
/// amounts; `profit`, `creator_commission` and `platform_fee` cover the whole
/// line (`quantity` units).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub line_id: String,
    pub provider_product_id: String,
    pub variant_id: Option<u64>,
    pub sku: String,
    pub quantity: u32,
    /// Unit cost in the provider's currency
    pub base_manufacturing_cost: Decimal,
    pub manufacturing_currency: String,
    /// Unit cost in local currency, converted with the order's rate snapshot
    pub base_cost: Decimal,
    /// Unit selling price in local currency
    pub selling_price: Decimal,
    pub commission_rate: Decimal,
    pub profit: Decimal,
    pub creator_commission: Decimal,
    pub platform_fee: Decimal,
    pub creator_id: String,
    pub status: OrderStatus,
}

impl OrderItem {
    pub fn line_selling_total(&self) -> Decimal {
        self.selling_price * Decimal::from(self.quantity)
    }

    pub fn line_base_total(&self) -> Decimal {
        self.base_cost * Decimal::from(self.quantity)
    }

    pub fn split(&self) -> CommissionSplit {
        CommissionSplit {
            profit: self.profit,
            creator_commission: self.creator_commission,
            platform_fee: self.platform_fee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    InTransit,
    Delivered,
}

/// One parcel event. Records are appended, never edited: a delivery is a new
/// record carrying the same tracking number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    /// Lines carried in this parcel; empty means the whole order
    pub line_ids: Vec<String>,
    pub status: ShipmentStatus,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Item,
    Shipping,
    Tax,
    Refund,
}

/// Provider-reported money movement, kept as an audit trail next to the
/// computed totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub kind: ChargeKind,
    pub amount: Decimal,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub currency: String,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub grand_total: Decimal,
    pub total_creator_commission: Decimal,
    pub total_platform_fee: Decimal,
}

impl OrderTotals {
    pub fn compute(
        currency: &str,
        items: &[OrderItem],
        shipping: Decimal,
        tax: Decimal,
        discount: Decimal,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(OrderItem::line_selling_total).sum();
        Self {
            currency: currency.to_string(),
            subtotal,
            shipping,
            tax,
            discount,
            grand_total: subtotal + shipping + tax - discount,
            total_creator_commission: items.iter().map(|i| i.creator_commission).sum(),
            total_platform_fee: items.iter().map(|i| i.platform_fee).sum(),
        }
    }
}

/// Why a status transition happened, kept in the order's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransitionCause {
    ProviderStatus(String),
    SentToProduction,
    ShipmentCreated,
    ShipmentDelivered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub cause: TransitionCause,
    pub at: DateTime<Utc>,
}
