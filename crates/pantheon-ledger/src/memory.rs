use async_trait::async_trait;
use chrono::Utc;
use pantheon_models::{DebateEntry, DebateRecord, LedgerReceipt};
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::ledger::Ledger;

pub const MEMORY_RECORDER: &str = "memory";

/// In-process ledger for dry runs and tests. Same append-only semantics as
/// the contract, nothing survives a restart.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<DebateRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record_debate(&self, entry: &DebateEntry) -> Result<LedgerReceipt, LedgerError> {
        let mut records = self.records.write().await;
        let id = records.len() as u64 + 1;
        records.push(DebateRecord::from_entry(
            id,
            Utc::now(),
            entry.clone(),
            MEMORY_RECORDER,
        ));
        Ok(LedgerReceipt {
            tx_hash: format!("memory-{id}"),
            block_number: Some(id),
            gas_used: 0,
        })
    }

    async fn total_debates(&self) -> Result<u64, LedgerError> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn debate(&self, id: u64) -> Result<DebateRecord, LedgerError> {
        let records = self.records.read().await;
        id.checked_sub(1)
            .and_then(|idx| records.get(idx as usize))
            .cloned()
            .ok_or(LedgerError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(consensus: &str) -> DebateEntry {
        DebateEntry {
            symbol: "ETH".to_string(),
            analyst_view: "BUY|80|Volume expanding".to_string(),
            skeptic_view: "BUY|60|Risk acceptable".to_string(),
            degen_view: "SELL|40|Fading the pump".to_string(),
            consensus: consensus.to_string(),
            final_confidence: 60,
        }
    }

    #[tokio::test]
    async fn empty_ledger() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.total_debates().await.unwrap(), 0);
        assert!(ledger.latest_debate().await.unwrap().is_none());
        assert!(matches!(
            ledger.debate(0).await,
            Err(LedgerError::NotFound(0))
        ));
        assert!(ledger.recent_debates(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_are_append_only_with_one_based_ids() {
        let ledger = MemoryLedger::new();
        let first = ledger.record_debate(&entry("BUY|MAJORITY|60")).await.unwrap();
        ledger.record_debate(&entry("HOLD|SPLIT|50")).await.unwrap();

        assert_eq!(first.tx_hash, "memory-1");
        assert_eq!(ledger.total_debates().await.unwrap(), 2);

        let one = ledger.debate(1).await.unwrap();
        assert_eq!(one.id, 1);
        assert_eq!(one.consensus, "BUY|MAJORITY|60");
        assert_eq!(one.recorder, MEMORY_RECORDER);

        let latest = ledger.latest_debate().await.unwrap().unwrap();
        assert_eq!(latest.id, 2);
        assert_eq!(latest.consensus, "HOLD|SPLIT|50");

        assert!(matches!(ledger.debate(3).await, Err(LedgerError::NotFound(3))));
    }

    #[tokio::test]
    async fn recent_debates_newest_first() {
        let ledger = MemoryLedger::new();
        for _ in 0..5 {
            ledger.record_debate(&entry("BUY|MAJORITY|60")).await.unwrap();
        }
        let recent = ledger.recent_debates(3).await.unwrap();
        let ids: Vec<u64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }
}
