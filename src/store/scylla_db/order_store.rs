use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use std::sync::Arc;

use crate::domain::order::Order;
use crate::store::OrderStore;
use super::lwt_applied;

/// Orders as JSON documents keyed on the provider order id.
///
/// Creation is `INSERT ... IF NOT EXISTS`; every later write is
/// `UPDATE ... IF version = ?`, so two deliveries racing on the same order
/// cannot both commit a transition computed from the same prior state.
pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn insert_if_absent(&self, order: &Order) -> Result<bool> {
        let document = serde_json::to_string(order)?;
        let result = self
            .session
            .query_unpaged(
                "INSERT INTO pod_orders (provider_order_id, order_number, version, status, document, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    &order.provider_order_id,
                    &order.order_number,
                    order.version,
                    order.status.as_str(),
                    document,
                    Utc::now(),
                ),
            )
            .await?;

        let applied = lwt_applied(result)?;
        tracing::debug!(
            provider_order_id = %order.provider_order_id,
            applied = applied,
            "Order insert-if-absent"
        );
        Ok(applied)
    }

    async fn load(&self, provider_order_id: &str) -> Result<Option<Order>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT version, document FROM pod_orders WHERE provider_order_id = ?",
                (provider_order_id,),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };

        match rows_result.maybe_first_row::<(i64, String)>()? {
            Some((version, document)) => {
                let mut order: Order = serde_json::from_str(&document)?;
                // The column is authoritative; the document copy is informational.
                order.version = version;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn compare_and_swap(&self, order: &Order, expected_version: i64) -> Result<bool> {
        let document = serde_json::to_string(order)?;
        let result = self
            .session
            .query_unpaged(
                "UPDATE pod_orders SET version = ?, status = ?, document = ?, updated_at = ?
                 WHERE provider_order_id = ? IF version = ?",
                (
                    order.version,
                    order.status.as_str(),
                    document,
                    Utc::now(),
                    &order.provider_order_id,
                    expected_version,
                ),
            )
            .await?;

        lwt_applied(result)
    }
}
