use async_trait::async_trait;

use super::value_objects::{CreatorEarnings, LedgerPosting};

/// Creator earnings storage.
///
/// `apply` is the only write path. Implementations must perform each posting
/// as one atomic update at the storage layer (never read-modify-write in the
/// caller) and must ignore a posting whose id was already applied, so a
/// re-flushed posting is not counted twice.
#[async_trait]
pub trait EarningsLedger: Send + Sync {
    /// Returns `false` when the posting had already been applied.
    async fn apply(&self, posting: &LedgerPosting) -> anyhow::Result<bool>;

    async fn earnings(&self, creator_id: &str) -> anyhow::Result<CreatorEarnings>;
}
