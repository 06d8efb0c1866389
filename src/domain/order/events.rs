use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::earnings::LedgerPosting;
use crate::domain::pricing::RateSnapshot;
use super::value_objects::*;

// ============================================================================
// Order Events - facts emitted by the Order aggregate
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Opened(OrderOpened),
    StatusChanged(StatusChange),
    ItemsStatusChanged(ItemsStatusChanged),
    ShipmentRecorded(Shipment),
    ChargeRecorded(Charge),
    PostingQueued(LedgerPosting),
    PostingsFlushed(PostingsFlushed),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Opened(_) => "OrderOpened",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::ItemsStatusChanged(_) => "OrderItemsStatusChanged",
            OrderEvent::ShipmentRecorded(_) => "OrderShipmentRecorded",
            OrderEvent::ChargeRecorded(_) => "OrderChargeRecorded",
            OrderEvent::PostingQueued(_) => "OrderPostingQueued",
            OrderEvent::PostingsFlushed(_) => "OrderPostingsFlushed",
        }
    }
}

/// First sighting of a provider order. Carries the complete initial state,
/// including the priced items and the exchange rate used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOpened {
    pub order_number: String,
    pub provider_order_id: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub commission_rate: Option<rust_decimal::Decimal>,
    pub exchange_rate: RateSnapshot,
    pub payment_status: PaymentStatus,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemsStatusChanged {
    pub line_ids: Vec<String>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingsFlushed {
    pub posting_ids: Vec<Uuid>,
}
