use std::sync::Arc;

use pantheon_ledger::{Ledger, LedgerError};
use pantheon_models::{AgentOpinion, Consensus, DebateEntry, DebateRecord, LedgerReceipt};
use serde::Serialize;
use tracing::{info, warn};

/// A confirmed write plus the record as read back from the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedDebate {
    pub receipt: LedgerReceipt,
    /// `None` when the read-back failed; the write itself still landed.
    pub record: Option<DebateRecord>,
}

/// Build the write payload. Opinions are in council order: analyst, skeptic, degen.
pub fn build_entry(symbol: &str, opinions: &[AgentOpinion; 3], consensus: &Consensus) -> DebateEntry {
    let [analyst, skeptic, degen] = opinions;
    DebateEntry {
        symbol: symbol.to_string(),
        analyst_view: analyst.to_wire(),
        skeptic_view: skeptic.to_wire(),
        degen_view: degen.to_wire(),
        consensus: consensus.to_wire(),
        final_confidence: u64::from(consensus.average_confidence),
    }
}

pub struct Recorder {
    ledger: Arc<dyn Ledger>,
}

impl Recorder {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Submit one debate as a single write and wait for confirmation.
    pub async fn record(
        &self,
        symbol: &str,
        opinions: &[AgentOpinion; 3],
        consensus: &Consensus,
    ) -> Result<RecordedDebate, LedgerError> {
        let entry = build_entry(symbol, opinions, consensus);
        info!(
            ledger = self.ledger.name(),
            symbol = %entry.symbol,
            consensus = %entry.consensus,
            "Recording debate"
        );

        let receipt = self.ledger.record_debate(&entry).await?;

        let record = match self.ledger.latest_debate().await {
            Ok(record) => record,
            Err(e) => {
                warn!(tx = %receipt.tx_hash, error = %e, "Debate recorded but read-back failed");
                None
            }
        };

        if let Some(record) = &record {
            info!(id = record.id, tx = %receipt.tx_hash, "Debate recorded");
        }

        Ok(RecordedDebate { receipt, record })
    }
}
