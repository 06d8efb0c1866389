use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Creator Earnings Value Objects
// ============================================================================

/// Running totals for one creator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorEarnings {
    pub creator_id: String,
    /// Commission owed on orders that have not been delivered yet
    pub pending_earnings: Decimal,
    /// Commission on delivered orders, payable
    pub total_earnings: Decimal,
    /// Lifetime gross sales attributed to the creator
    pub total_sales: Decimal,
    pub total_orders: i64,
}

impl CreatorEarnings {
    pub fn empty(creator_id: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            ..Default::default()
        }
    }

    /// Apply a posting to an in-memory copy of the totals.
    pub fn apply(&mut self, posting: &LedgerPosting) {
        match posting.kind {
            PostingKind::Accrue => {
                self.pending_earnings += posting.commission;
                self.total_sales += posting.sales;
                self.total_orders += posting.orders;
            }
            PostingKind::Realize => {
                self.total_earnings += posting.commission;
                self.pending_earnings -= posting.commission;
            }
            PostingKind::Release => {
                self.pending_earnings -= posting.commission;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingKind {
    /// Order confirmed: commission becomes pending, sales and order count grow
    Accrue,
    /// Order delivered: commission moves from pending to realized
    Realize,
    /// Order cancelled before delivery: pending commission is dropped
    Release,
}

/// One counter update against a creator's earnings, produced by an order
/// transition and queued on the order until it has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub id: Uuid,
    pub order_number: String,
    pub creator_id: String,
    pub kind: PostingKind,
    pub commission: Decimal,
    pub sales: Decimal,
    pub orders: i64,
}

impl LedgerPosting {
    pub fn accrue(order_number: &str, creator_id: &str, commission: Decimal, sales: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.to_string(),
            creator_id: creator_id.to_string(),
            kind: PostingKind::Accrue,
            commission,
            sales,
            orders: 1,
        }
    }

    pub fn realize(order_number: &str, creator_id: &str, commission: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.to_string(),
            creator_id: creator_id.to_string(),
            kind: PostingKind::Realize,
            commission,
            sales: Decimal::ZERO,
            orders: 0,
        }
    }

    pub fn release(order_number: &str, creator_id: &str, commission: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.to_string(),
            creator_id: creator_id.to_string(),
            kind: PostingKind::Release,
            commission,
            sales: Decimal::ZERO,
            orders: 0,
        }
    }
}
