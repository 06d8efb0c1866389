use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::domain::aggregate::Aggregate;
use crate::domain::earnings::EarningsLedger;
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::{retry_on_transient, IsTransient, RetryConfig};

use super::aggregate::Order;
use super::commands::{OpenOrder, OrderCommand};
use super::events::OrderEvent;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Command -> load -> Aggregate decides -> conditional write -> ledger flush
//
// The conditional write re-runs the whole decision on conflict, so the
// allowed-prior-state check always sees the state it is replacing.
//
// ============================================================================

#[derive(Debug)]
pub enum OpenOutcome {
    Created(Order),
    /// An order for this provider id already existed; nothing was written
    Duplicate(Order),
    /// The payload could not be turned into a valid order
    Rejected(String),
}

#[derive(Debug)]
pub enum CommandOutcome {
    Applied {
        from: OrderStatus,
        order: Order,
        events: Vec<OrderEvent>,
    },
    /// Accepted but nothing to change (duplicate delivery, same status)
    Unchanged(Order),
    /// Refused by the state machine; logged, never surfaced to the provider
    Rejected { reason: String, order: Order },
    UnknownOrder,
}

#[derive(Debug, thiserror::Error)]
enum WriteAttemptError {
    #[error("Version conflict on order {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IsTransient for WriteAttemptError {
    fn is_transient(&self) -> bool {
        matches!(self, WriteAttemptError::Conflict(_))
    }
}

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    ledger: Arc<dyn EarningsLedger>,
    metrics: Option<Arc<Metrics>>,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>, ledger: Arc<dyn EarningsLedger>) -> Self {
        Self {
            store,
            ledger,
            metrics: None,
            retry: RetryConfig::conditional_writes(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn load(&self, provider_order_id: &str) -> Result<Option<Order>> {
        self.store.load(provider_order_id).await
    }

    /// Create the order on first sighting. Idempotent on the provider id.
    pub async fn open(&self, command: OpenOrder) -> Result<OpenOutcome> {
        let provider_order_id = command.provider_order_id.clone();

        if let Some(existing) = self.store.load(&provider_order_id).await? {
            tracing::debug!(provider_order_id = %provider_order_id, "Order already exists, skipping create");
            self.flush_postings(&existing).await?;
            return Ok(OpenOutcome::Duplicate(existing));
        }

        let events = match Order::decide_open(&command) {
            Ok(events) => events,
            Err(e) => return Ok(OpenOutcome::Rejected(e.to_string())),
        };
        let mut order = match Order::from_events(&events) {
            Ok(order) => order,
            Err(e) => return Ok(OpenOutcome::Rejected(e.to_string())),
        };
        order.version = 1;

        if !self.store.insert_if_absent(&order).await? {
            // A concurrent delivery of the same order won the insert.
            let existing = self
                .store
                .load(&provider_order_id)
                .await?
                .ok_or_else(|| anyhow!("Order {} missing after insert conflict", provider_order_id))?;
            tracing::debug!(provider_order_id = %provider_order_id, "Lost create race, using stored order");
            self.flush_postings(&existing).await?;
            return Ok(OpenOutcome::Duplicate(existing));
        }

        tracing::info!(
            order_number = %order.order_number,
            provider_order_id = %provider_order_id,
            items = order.items.len(),
            grand_total = %order.totals.grand_total,
            "📦 Order created"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_transition("none", order.status.as_str());
        }

        self.flush_postings(&order).await?;
        Ok(OpenOutcome::Created(order))
    }

    /// Run a command against the stored order with compare-and-set retry.
    pub async fn execute(&self, provider_order_id: &str, command: OrderCommand) -> Result<CommandOutcome> {
        let outcome = self.execute_conditional(provider_order_id, &command).await?;

        match &outcome {
            CommandOutcome::Applied { from, order, events } => {
                for event in events {
                    if let OrderEvent::StatusChanged(change) = event {
                        tracing::info!(
                            order_number = %order.order_number,
                            from = %change.from,
                            to = %change.to,
                            "🔄 Order status changed"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_transition(change.from.as_str(), change.to.as_str());
                        }
                    }
                }
                tracing::debug!(
                    order_number = %order.order_number,
                    command = command.name(),
                    from = %from,
                    version = order.version,
                    "Order command applied"
                );
                self.flush_postings(order).await?;
            }
            CommandOutcome::Unchanged(order) => {
                self.flush_postings(order).await?;
            }
            CommandOutcome::Rejected { reason, order } => {
                tracing::warn!(
                    order_number = %order.order_number,
                    command = command.name(),
                    status = %order.status,
                    reason = %reason,
                    "Order command rejected"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejected_command(command.name());
                }
                self.flush_postings(order).await?;
            }
            CommandOutcome::UnknownOrder => {}
        }

        Ok(outcome)
    }

    async fn execute_conditional(&self, provider_order_id: &str, command: &OrderCommand) -> Result<CommandOutcome> {
        let metrics = self.metrics.clone();
        let result = retry_on_transient(self.retry.clone(), command.name(), move |attempt| {
            if attempt > 1 {
                if let Some(metrics) = &metrics {
                    metrics.record_retry_attempt("order_conditional_write");
                }
            }
            self.try_execute(provider_order_id, command)
        })
        .await;

        result.into_result().map_err(|e| match e {
            WriteAttemptError::Conflict(id) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_retry_exhausted("order_conditional_write");
                }
                anyhow!("Gave up on order {} after repeated version conflicts", id)
            }
            WriteAttemptError::Store(e) => e,
        })
    }

    async fn try_execute(
        &self,
        provider_order_id: &str,
        command: &OrderCommand,
    ) -> std::result::Result<CommandOutcome, WriteAttemptError> {
        let Some(order) = self.store.load(provider_order_id).await? else {
            return Ok(CommandOutcome::UnknownOrder);
        };

        let events = match order.handle_command(command) {
            Ok(events) => events,
            Err(e) => {
                return Ok(CommandOutcome::Rejected {
                    reason: e.to_string(),
                    order,
                })
            }
        };
        if events.is_empty() {
            return Ok(CommandOutcome::Unchanged(order));
        }

        let expected_version = order.version();
        let from = order.status;
        let mut next = order;
        next.apply_all(&events)
            .map_err(|e| anyhow!("Failed to apply events to order {}: {}", provider_order_id, e))?;
        next.version = expected_version + 1;

        if !self.store.compare_and_swap(&next, expected_version).await? {
            return Err(WriteAttemptError::Conflict(provider_order_id.to_string()));
        }

        Ok(CommandOutcome::Applied {
            from,
            order: next,
            events,
        })
    }

    /// Apply the order's queued postings to the ledger, then drop them from
    /// the order. The ledger ignores replays, so a crash between the two
    /// steps only means the next touch re-applies harmlessly.
    pub async fn flush_postings(&self, order: &Order) -> Result<usize> {
        if order.unposted.is_empty() {
            return Ok(0);
        }

        let mut applied = 0;
        for posting in &order.unposted {
            if self.ledger.apply(posting).await? {
                applied += 1;
                tracing::info!(
                    order_number = %posting.order_number,
                    creator_id = %posting.creator_id,
                    kind = ?posting.kind,
                    commission = %posting.commission,
                    "💰 Earnings posting applied"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_posting(match posting.kind {
                        crate::domain::earnings::PostingKind::Accrue => "accrue",
                        crate::domain::earnings::PostingKind::Realize => "realize",
                        crate::domain::earnings::PostingKind::Release => "release",
                    });
                }
            }
        }

        let flush = OrderCommand::FlushPostings {
            posting_ids: order.unposted.iter().map(|p| p.id).collect(),
        };
        if let Err(e) = self.execute_conditional(&order.provider_order_id, &flush).await {
            // Postings stay queued and are re-offered on the next touch.
            tracing::warn!(
                order_number = %order.order_number,
                error = %e,
                "Could not clear applied postings from order"
            );
        }

        Ok(applied)
    }
}
