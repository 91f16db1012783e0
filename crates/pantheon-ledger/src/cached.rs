use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use pantheon_models::{DebateEntry, DebateRecord, LedgerReceipt};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::Ledger;

/// Read-through cache in front of a ledger, backed by moka.
///
/// Records never change once written, so they are kept until evicted by
/// capacity. The debate count goes stale as soon as anyone writes, so it
/// lives for `count_ttl` and is dropped on every write made through here.
/// A count fetched while a write was landing is never kept.
pub struct CachedLedger {
    inner: Arc<dyn Ledger>,
    records: Cache<u64, DebateRecord>,
    total: Cache<(), u64>,
    /// Bumped on every write, before the count is invalidated.
    writes: AtomicU64,
}

impl CachedLedger {
    pub fn new(inner: Arc<dyn Ledger>, max_capacity: u64, count_ttl: Duration) -> Self {
        Self {
            inner,
            records: Cache::builder().max_capacity(max_capacity).build(),
            total: Cache::builder()
                .max_capacity(1)
                .time_to_live(count_ttl)
                .build(),
            writes: AtomicU64::new(0),
        }
    }

    pub fn cached_records(&self) -> u64 {
        self.records.entry_count()
    }
}

#[async_trait]
impl Ledger for CachedLedger {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn record_debate(&self, entry: &DebateEntry) -> Result<LedgerReceipt, LedgerError> {
        let receipt = self.inner.record_debate(entry).await;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.total.invalidate(&()).await;
        receipt
    }

    async fn total_debates(&self) -> Result<u64, LedgerError> {
        if let Some(total) = self.total.get(&()).await {
            return Ok(total);
        }
        let generation = self.writes.load(Ordering::SeqCst);
        let total = self.inner.total_debates().await?;
        if self.writes.load(Ordering::SeqCst) == generation {
            self.total.insert((), total).await;
            // A write may have slipped in between the check and the insert.
            if self.writes.load(Ordering::SeqCst) != generation {
                self.total.invalidate(&()).await;
            }
        } else {
            debug!(total, "Write landed during count read, not caching");
        }
        Ok(total)
    }

    async fn debate(&self, id: u64) -> Result<DebateRecord, LedgerError> {
        if let Some(record) = self.records.get(&id).await {
            debug!(id, "Debate served from cache");
            return Ok(record);
        }
        let record = self.inner.debate(id).await?;
        self.records.insert(id, record.clone()).await;
        Ok(record)
    }
}
