use anyhow::Result;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::query_result::QueryResult;
use scylla::value::{CqlValue, Row};
use std::sync::Arc;

mod catalog;
mod dead_letter;
mod earnings;
mod order_store;
mod schema;

pub use catalog::{ScyllaCatalogStore, ScyllaDesignRequestStore};
pub use dead_letter::ScyllaDeadLetterStore;
pub use earnings::ScyllaEarningsLedger;
pub use order_store::ScyllaOrderStore;

// ============================================================================
// ScyllaDB Stores
// ============================================================================
//
// - pod_orders:        one row per order, LWT-guarded version column
// - creator_earnings:  counter columns, money in cents
// - applied_postings:  LWT dedupe of ledger postings
// - catalog_*:         listings, plus a lookup by provider product id
// - design_requests, webhook_dead_letters
//
// Documents are stored as JSON text next to the columns we query on.
//
// ============================================================================

/// Connect, create the keyspace and tables if missing, and switch to the keyspace.
pub async fn connect(node: &str, keyspace: &str) -> Result<Arc<Session>> {
    tracing::info!(node = %node, keyspace = %keyspace, "Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new().known_node(node).build().await?;

    schema::ensure_schema(&session, keyspace).await?;
    session.use_keyspace(keyspace, false).await?;

    tracing::info!("✅ ScyllaDB ready");
    Ok(Arc::new(session))
}

/// Read the `[applied]` flag of a lightweight-transaction result.
///
/// A rejected LWT also returns the current row, so the result is read
/// untyped rather than as a fixed tuple.
pub(crate) fn lwt_applied(result: QueryResult) -> Result<bool> {
    let rows = result.into_rows_result()?;
    let row = rows.maybe_first_row::<Row>()?;
    match row.and_then(|r| r.columns.into_iter().next().flatten()) {
        Some(CqlValue::Boolean(applied)) => Ok(applied),
        other => anyhow::bail!("Unexpected LWT result: {:?}", other),
    }
}
