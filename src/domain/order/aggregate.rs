use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::aggregate::Aggregate;
use crate::domain::earnings::LedgerPosting;
use crate::domain::pricing::{split_line, RateSnapshot};
use super::commands::{NewShipment, OpenOrder, OrderCommand};
use super::errors::OrderError;
use super::events::*;
use super::status_mapper::map_provider_status;
use super::value_objects::*;

// ============================================================================
// Order Aggregate
// ============================================================================
//
// pending -> confirmed -> in_production -> shipped -> delivered (T)
// cancelled (T) and failed (T) are reachable from any non-terminal state.
//
// Ledger postings produced by a transition are queued on the order in the
// same write as the transition and dropped once the earnings ledger has
// applied them.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub order_number: String,
    pub provider_order_id: String,
    pub version: i64,

    pub customer: CustomerSnapshot,
    pub items: Vec<OrderItem>,
    pub shipments: Vec<Shipment>,
    pub charges: Vec<Charge>,
    pub totals: OrderTotals,
    /// Rate of the first line, captured at order time
    pub commission_rate: Option<Decimal>,
    pub exchange_rate: RateSnapshot,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub status_history: Vec<StatusChange>,

    /// Earnings postings not yet applied to the ledger
    pub unposted: Vec<LedgerPosting>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn generate_order_number(at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("POD-{}-{}", at.format("%Y%m%d"), suffix)
    }

    /// Decide the events for the first sighting of a provider order.
    pub fn decide_open(command: &OpenOrder) -> Result<Vec<OrderEvent>, OrderError> {
        let mut items = Vec::with_capacity(command.items.len());

        for item in &command.items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    line_id: item.line_id.clone(),
                    quantity: item.quantity,
                });
            }

            let base_cost = command
                .exchange_rate
                .convert(item.base_manufacturing_cost, &item.manufacturing_currency)?;
            let split = split_line(item.selling_price, base_cost, item.quantity, item.commission_rate)?;

            items.push(OrderItem {
                line_id: item.line_id.clone(),
                provider_product_id: item.provider_product_id.clone(),
                variant_id: item.variant_id,
                sku: item.sku.clone(),
                quantity: item.quantity,
                base_manufacturing_cost: item.base_manufacturing_cost,
                manufacturing_currency: item.manufacturing_currency.clone(),
                base_cost,
                selling_price: item.selling_price,
                commission_rate: item.commission_rate,
                profit: split.profit,
                creator_commission: split.creator_commission,
                platform_fee: split.platform_fee,
                creator_id: item.creator_id.clone(),
                status: OrderStatus::Confirmed,
            });
        }

        let totals = OrderTotals::compute(
            &command.currency,
            &items,
            command.shipping,
            command.tax,
            command.discount,
        );
        let order_number = Self::generate_order_number(command.occurred_at);

        let mut events = Vec::new();
        let accruals: Vec<LedgerPosting> = Self::commission_by_creator(&items)
            .into_iter()
            .map(|(creator_id, (commission, sales))| {
                LedgerPosting::accrue(&order_number, &creator_id, commission, sales)
            })
            .collect();

        events.push(OrderEvent::Opened(OrderOpened {
            order_number,
            provider_order_id: command.provider_order_id.clone(),
            customer: command.customer.clone(),
            commission_rate: items.first().map(|i| i.commission_rate),
            items,
            totals,
            exchange_rate: command.exchange_rate.clone(),
            payment_status: PaymentStatus::Paid,
            opened_at: command.occurred_at,
        }));
        events.extend(command.charges.iter().cloned().map(OrderEvent::ChargeRecorded));
        events.extend(accruals.into_iter().map(OrderEvent::PostingQueued));

        Ok(events)
    }

    /// creator -> (commission, gross sales)
    fn commission_by_creator<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> BTreeMap<String, (Decimal, Decimal)> {
        let mut by_creator: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for item in items {
            let entry = by_creator.entry(item.creator_id.clone()).or_default();
            entry.0 += item.creator_commission;
            entry.1 += item.line_selling_total();
        }
        by_creator
    }

    /// Check the money invariants of the stored totals.
    pub fn check_invariants(&self) -> Result<(), OrderError> {
        let t = &self.totals;

        if t.grand_total != t.subtotal + t.shipping + t.tax - t.discount {
            return Err(OrderError::InvariantViolation(format!(
                "grand total {} != {} + {} + {} - {}",
                t.grand_total, t.subtotal, t.shipping, t.tax, t.discount
            )));
        }

        let subtotal: Decimal = self.items.iter().map(OrderItem::line_selling_total).sum();
        if t.subtotal != subtotal {
            return Err(OrderError::InvariantViolation(format!(
                "subtotal {} != sum of lines {}",
                t.subtotal, subtotal
            )));
        }

        for item in &self.items {
            if item.creator_commission + item.platform_fee != item.profit {
                return Err(OrderError::InvariantViolation(format!(
                    "line {}: commission {} + fee {} != profit {}",
                    item.line_id, item.creator_commission, item.platform_fee, item.profit
                )));
            }
            let expected = (item.line_selling_total() - item.line_base_total()).max(Decimal::ZERO);
            if item.profit != expected {
                return Err(OrderError::InvariantViolation(format!(
                    "line {}: profit {} != selling - base {}",
                    item.line_id, item.profit, expected
                )));
            }
        }

        let commission: Decimal = self.items.iter().map(|i| i.creator_commission).sum();
        let fees: Decimal = self.items.iter().map(|i| i.platform_fee).sum();
        if t.total_creator_commission != commission || t.total_platform_fee != fees {
            return Err(OrderError::InvariantViolation(
                "commission/fee totals do not match lines".to_string(),
            ));
        }

        Ok(())
    }

    fn ensure_not_terminal(&self, attempted: &'static str) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::TerminalState {
                current: self.status,
                attempted,
            });
        }
        Ok(())
    }

    /// Items addressed by a shipment. Lines may be named by line id, SKU or
    /// provider product id; an empty list means every line.
    fn addressed_items<'a>(&'a self, requested: &'a [String]) -> impl Iterator<Item = &'a OrderItem> + 'a {
        self.items.iter().filter(move |item| {
            requested.is_empty()
                || requested.iter().any(|r| {
                    r == &item.line_id || r == &item.sku || r == &item.provider_product_id
                })
        })
    }

    fn has_shipment(&self, shipment: &NewShipment, status: ShipmentStatus) -> bool {
        self.shipments.iter().any(|s| {
            s.status == status
                && s.tracking_number == shipment.tracking_number
                && (shipment.tracking_number.is_some() || s.line_ids == shipment.line_ids)
        })
    }

    fn shipment_record(&self, shipment: &NewShipment, status: ShipmentStatus) -> Shipment {
        let (dispatched_at, delivered_at) = match status {
            ShipmentStatus::InTransit => (Some(shipment.occurred_at), None),
            ShipmentStatus::Delivered => (None, Some(shipment.occurred_at)),
        };
        Shipment {
            id: Uuid::new_v4(),
            carrier: shipment.carrier.clone(),
            tracking_number: shipment.tracking_number.clone(),
            tracking_url: shipment.tracking_url.clone(),
            line_ids: shipment.line_ids.clone(),
            status,
            dispatched_at,
            delivered_at,
            recorded_at: Utc::now(),
        }
    }

    /// Events for an order-level move to `target`, including per-item status
    /// and the ledger postings the move implies.
    fn transition_to(&self, target: OrderStatus, cause: TransitionCause) -> Vec<OrderEvent> {
        if target == self.status {
            return Vec::new();
        }

        let mut events = vec![OrderEvent::StatusChanged(StatusChange {
            from: self.status,
            to: target,
            cause,
            at: Utc::now(),
        })];

        // Delivered lines stay delivered; everything else follows the order.
        let line_ids: Vec<String> = self
            .items
            .iter()
            .filter(|item| item.status != target && item.status != OrderStatus::Delivered)
            .map(|item| item.line_id.clone())
            .collect();
        if !line_ids.is_empty() {
            events.push(OrderEvent::ItemsStatusChanged(ItemsStatusChanged {
                line_ids,
                status: target,
            }));
        }

        events.extend(self.postings_for(target).into_iter().map(OrderEvent::PostingQueued));

        events
    }

    /// Ledger postings for an order-level move to `target`.
    ///
    /// Cancelling releases only the lines that get cancelled. Lines already
    /// delivered are realized in the same move, since the order will never
    /// reach `delivered` as a whole.
    fn postings_for(&self, target: OrderStatus) -> Vec<LedgerPosting> {
        let (delivered, open): (Vec<&OrderItem>, Vec<&OrderItem>) = self
            .items
            .iter()
            .partition(|item| item.status == OrderStatus::Delivered);

        let (realized, released) = match target {
            OrderStatus::Delivered => (self.items.iter().collect(), Vec::new()),
            OrderStatus::Cancelled => (delivered, open),
            _ => return Vec::new(),
        };

        let realize = Self::commission_by_creator(realized)
            .into_iter()
            .filter(|(_, (commission, _))| !commission.is_zero())
            .map(|(creator_id, (commission, _))| {
                LedgerPosting::realize(&self.order_number, &creator_id, commission)
            });
        let release = Self::commission_by_creator(released)
            .into_iter()
            .filter(|(_, (commission, _))| !commission.is_zero())
            .map(|(creator_id, (commission, _))| {
                LedgerPosting::release(&self.order_number, &creator_id, commission)
            });

        realize.chain(release).collect()
    }

    fn handle_record_shipment(&self, shipment: &NewShipment) -> Vec<OrderEvent> {
        let mut events = Vec::new();

        if !self.has_shipment(shipment, ShipmentStatus::InTransit) {
            events.push(OrderEvent::ShipmentRecorded(
                self.shipment_record(shipment, ShipmentStatus::InTransit),
            ));
        }

        // Parcels on a terminal order are kept for the audit trail only.
        if self.status.is_terminal() {
            return events;
        }

        if matches!(self.status, OrderStatus::InProduction | OrderStatus::Confirmed) {
            events.extend(self.transition_to(OrderStatus::Shipped, TransitionCause::ShipmentCreated));
        } else {
            let line_ids: Vec<String> = self
                .addressed_items(&shipment.line_ids)
                .filter(|item| !item.status.is_terminal() && item.status != OrderStatus::Shipped)
                .map(|item| item.line_id.clone())
                .collect();
            if !line_ids.is_empty() {
                events.push(OrderEvent::ItemsStatusChanged(ItemsStatusChanged {
                    line_ids,
                    status: OrderStatus::Shipped,
                }));
            }
        }

        events
    }

    fn handle_mark_delivered(&self, shipment: &NewShipment) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status == OrderStatus::Delivered {
            return Ok(Vec::new());
        }
        self.ensure_not_terminal("delivery")?;

        let mut events = Vec::new();
        if !self.has_shipment(shipment, ShipmentStatus::Delivered) {
            events.push(OrderEvent::ShipmentRecorded(
                self.shipment_record(shipment, ShipmentStatus::Delivered),
            ));
        }

        let delivered_now: Vec<String> = self
            .addressed_items(&shipment.line_ids)
            .filter(|item| item.status != OrderStatus::Delivered)
            .map(|item| item.line_id.clone())
            .collect();
        let still_open = self
            .items
            .iter()
            .any(|item| item.status != OrderStatus::Delivered && !delivered_now.contains(&item.line_id));

        if !still_open {
            // Honoured from any non-terminal state: delivery webhooks can race
            // ahead of the status update that would have set `shipped`.
            events.extend(self.transition_to(OrderStatus::Delivered, TransitionCause::ShipmentDelivered));
            return Ok(events);
        }

        // Partial delivery: the lines are authoritative, the order is a summary.
        if !delivered_now.is_empty() {
            events.push(OrderEvent::ItemsStatusChanged(ItemsStatusChanged {
                line_ids: delivered_now,
                status: OrderStatus::Delivered,
            }));
        }
        if matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::InProduction
        ) {
            events.push(OrderEvent::StatusChanged(StatusChange {
                from: self.status,
                to: OrderStatus::Shipped,
                cause: TransitionCause::ShipmentDelivered,
                at: Utc::now(),
            }));
        }

        Ok(events)
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Opened(e) => {
                let order = Self {
                    order_number: e.order_number.clone(),
                    provider_order_id: e.provider_order_id.clone(),
                    version: 0,
                    customer: e.customer.clone(),
                    items: e.items.clone(),
                    shipments: Vec::new(),
                    charges: Vec::new(),
                    totals: e.totals.clone(),
                    commission_rate: e.commission_rate,
                    exchange_rate: e.exchange_rate.clone(),
                    status: OrderStatus::Confirmed,
                    payment_status: e.payment_status,
                    status_history: Vec::new(),
                    unposted: Vec::new(),
                    created_at: e.opened_at,
                    updated_at: e.opened_at,
                };
                order.check_invariants()?;
                Ok(order)
            }
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        self.updated_at = Utc::now();

        match event {
            OrderEvent::Opened(_) => return Err(OrderError::AlreadyOpened),
            OrderEvent::StatusChanged(change) => {
                self.status = change.to;
                self.status_history.push(change.clone());
            }
            OrderEvent::ItemsStatusChanged(change) => {
                for item in self.items.iter_mut() {
                    if change.line_ids.contains(&item.line_id) {
                        item.status = change.status;
                    }
                }
            }
            OrderEvent::ShipmentRecorded(shipment) => {
                self.shipments.push(shipment.clone());
            }
            OrderEvent::ChargeRecorded(charge) => {
                if charge.kind == ChargeKind::Refund {
                    self.payment_status = PaymentStatus::Refunded;
                }
                self.charges.push(charge.clone());
            }
            OrderEvent::PostingQueued(posting) => {
                self.unposted.push(posting.clone());
            }
            OrderEvent::PostingsFlushed(flushed) => {
                self.unposted.retain(|p| !flushed.posting_ids.contains(&p.id));
            }
        }

        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ApplyProviderStatus { raw_status } => {
                // Unparseable input never moves a known-good state.
                let target = map_provider_status(raw_status)
                    .ok_or_else(|| OrderError::UnrecognizedProviderStatus(raw_status.clone()))?;
                self.ensure_not_terminal("provider status update")?;

                Ok(self.transition_to(target, TransitionCause::ProviderStatus(raw_status.clone())))
            }

            OrderCommand::SendToProduction => {
                self.ensure_not_terminal("send to production")?;
                match self.status {
                    OrderStatus::Pending | OrderStatus::Confirmed => Ok(self.transition_to(
                        OrderStatus::InProduction,
                        TransitionCause::SentToProduction,
                    )),
                    OrderStatus::InProduction => Ok(Vec::new()),
                    from => Err(OrderError::InvalidTransition {
                        from,
                        to: OrderStatus::InProduction,
                    }),
                }
            }

            OrderCommand::RecordShipment(shipment) => Ok(self.handle_record_shipment(shipment)),

            OrderCommand::MarkDelivered(shipment) => self.handle_mark_delivered(shipment),

            OrderCommand::RecordCharge(charge) if charge.kind == ChargeKind::Refund => {
                // Refunds arrive as a running total; only the increase is logged.
                let logged: Decimal = self
                    .charges
                    .iter()
                    .filter(|c| c.kind == ChargeKind::Refund && c.currency == charge.currency)
                    .map(|c| c.amount)
                    .sum();
                let increase = charge.amount - logged;
                if increase <= Decimal::ZERO {
                    return Ok(Vec::new());
                }
                Ok(vec![OrderEvent::ChargeRecorded(Charge {
                    amount: increase,
                    ..charge.clone()
                })])
            }

            OrderCommand::RecordCharge(charge) => {
                // Redelivered webhooks repeat the same charge.
                let seen = self.charges.iter().any(|c| {
                    c.kind == charge.kind && c.amount == charge.amount && c.currency == charge.currency
                });
                if seen {
                    return Ok(Vec::new());
                }
                Ok(vec![OrderEvent::ChargeRecorded(charge.clone())])
            }

            OrderCommand::FlushPostings { posting_ids } => {
                let present: Vec<Uuid> = posting_ids
                    .iter()
                    .filter(|id| self.unposted.iter().any(|p| &p.id == *id))
                    .copied()
                    .collect();
                if present.is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![OrderEvent::PostingsFlushed(PostingsFlushed {
                    posting_ids: present,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> &str {
        &self.provider_order_id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
