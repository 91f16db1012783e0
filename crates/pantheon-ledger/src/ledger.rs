use async_trait::async_trait;
use pantheon_models::{DebateEntry, DebateRecord, LedgerReceipt};

use crate::error::LedgerError;

/// Append-only debate store. Ids are assigned by the ledger, start at 1 and
/// are contiguous, so the latest debate always has `id == total_debates()`.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Submit one debate and wait until the write is confirmed.
    async fn record_debate(&self, entry: &DebateEntry) -> Result<LedgerReceipt, LedgerError>;

    async fn total_debates(&self) -> Result<u64, LedgerError>;

    async fn debate(&self, id: u64) -> Result<DebateRecord, LedgerError>;

    /// `None` until the first debate lands.
    async fn latest_debate(&self) -> Result<Option<DebateRecord>, LedgerError> {
        let total = self.total_debates().await?;
        if total == 0 {
            return Ok(None);
        }
        self.debate(total).await.map(Some)
    }

    /// Up to `limit` debates, newest first.
    async fn recent_debates(&self, limit: u64) -> Result<Vec<DebateRecord>, LedgerError> {
        let total = self.total_debates().await?;
        let mut records = Vec::new();
        for id in recent_ids(total, limit) {
            records.push(self.debate(id).await?);
        }
        Ok(records)
    }
}

/// Ids of the newest `limit` debates, descending: `total ..= max(1, total - limit + 1)`.
pub fn recent_ids(total: u64, limit: u64) -> impl Iterator<Item = u64> {
    let start = total.saturating_sub(limit).saturating_add(1).max(1);
    (start..=total).rev()
}
