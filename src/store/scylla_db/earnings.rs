use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use scylla::value::Counter;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::earnings::{CreatorEarnings, EarningsLedger, LedgerPosting, PostingKind};
use crate::domain::pricing::{from_cents, to_cents};
use super::lwt_applied;

/// Creator earnings as counter columns (cents).
///
/// A posting is claimed in `applied_postings` with an LWT first; only the
/// claimant issues the counter update, which is a single atomic statement.
/// A failed counter update gives the claim back so a later flush retries it.
pub struct ScyllaEarningsLedger {
    session: Arc<Session>,
}

impl ScyllaEarningsLedger {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

fn kind_name(kind: PostingKind) -> &'static str {
    match kind {
        PostingKind::Accrue => "accrue",
        PostingKind::Realize => "realize",
        PostingKind::Release => "release",
    }
}

/// The three statements a counter posting is made of.
#[async_trait]
trait ClaimedCounters: Send + Sync {
    /// `false` when another flush already holds the claim.
    async fn claim(&self, posting: &LedgerPosting) -> Result<bool>;

    async fn increment(&self, posting: &LedgerPosting) -> Result<()>;

    async fn unclaim(&self, posting_id: Uuid) -> Result<()>;
}

async fn apply_claimed(counters: &dyn ClaimedCounters, posting: &LedgerPosting) -> Result<bool> {
    if !counters.claim(posting).await? {
        tracing::debug!(posting_id = %posting.id, "Posting already applied");
        return Ok(false);
    }

    if let Err(e) = counters.increment(posting).await {
        if let Err(undo) = counters.unclaim(posting.id).await {
            // The claim now hides a posting that never reached the counters.
            tracing::error!(
                posting_id = %posting.id,
                creator_id = %posting.creator_id,
                order_number = %posting.order_number,
                error = %undo,
                "❌ Counter update failed and the posting claim could not be released"
            );
        }
        return Err(e);
    }

    Ok(true)
}

#[async_trait]
impl ClaimedCounters for ScyllaEarningsLedger {
    async fn claim(&self, posting: &LedgerPosting) -> Result<bool> {
        let claim = self
            .session
            .query_unpaged(
                "INSERT INTO applied_postings (posting_id, creator_id, order_number, kind, applied_at)
                 VALUES (?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    posting.id,
                    &posting.creator_id,
                    &posting.order_number,
                    kind_name(posting.kind),
                    Utc::now(),
                ),
            )
            .await?;
        lwt_applied(claim)
    }

    async fn increment(&self, posting: &LedgerPosting) -> Result<()> {
        let commission = to_cents(posting.commission);
        let (pending, total) = match posting.kind {
            PostingKind::Accrue => (commission, 0),
            PostingKind::Realize => (-commission, commission),
            PostingKind::Release => (-commission, 0),
        };

        self.session
            .query_unpaged(
                "UPDATE creator_earnings SET
                    pending_cents = pending_cents + ?,
                    total_cents = total_cents + ?,
                    sales_cents = sales_cents + ?,
                    order_count = order_count + ?
                 WHERE creator_id = ?",
                (
                    Counter(pending),
                    Counter(total),
                    Counter(to_cents(posting.sales)),
                    Counter(posting.orders),
                    &posting.creator_id,
                ),
            )
            .await?;
        Ok(())
    }

    async fn unclaim(&self, posting_id: Uuid) -> Result<()> {
        self.session
            .query_unpaged(
                "DELETE FROM applied_postings WHERE posting_id = ? IF EXISTS",
                (posting_id,),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EarningsLedger for ScyllaEarningsLedger {
    async fn apply(&self, posting: &LedgerPosting) -> Result<bool> {
        apply_claimed(self, posting).await
    }

    async fn earnings(&self, creator_id: &str) -> Result<CreatorEarnings> {
        let result = self
            .session
            .query_unpaged(
                "SELECT pending_cents, total_cents, sales_cents, order_count
                 FROM creator_earnings WHERE creator_id = ?",
                (creator_id,),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(CreatorEarnings::empty(creator_id)),
        };

        let row = rows_result
            .maybe_first_row::<(Option<Counter>, Option<Counter>, Option<Counter>, Option<Counter>)>()?;
        let Some((pending, total, sales, orders)) = row else {
            return Ok(CreatorEarnings::empty(creator_id));
        };
        let cents = |c: Option<Counter>| c.map(|c| c.0).unwrap_or(0);

        Ok(CreatorEarnings {
            creator_id: creator_id.to_string(),
            pending_earnings: from_cents(cents(pending)),
            total_earnings: from_cents(cents(total)),
            total_sales: from_cents(cents(sales)),
            total_orders: cents(orders),
        })
    }
}
