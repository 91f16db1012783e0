use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusSummary;
use crate::error::ModelError;
use crate::opinion::{AgentOpinion, Decision};

/// Payload for one `recordDebate` write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DebateEntry {
    pub symbol: String,
    pub analyst_view: String,
    pub skeptic_view: String,
    pub degen_view: String,
    pub consensus: String,
    pub final_confidence: u64,
}

/// A debate as stored by the ledger. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DebateRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub analyst_view: String,
    pub skeptic_view: String,
    pub degen_view: String,
    pub consensus: String,
    pub final_confidence: u64,
    /// Address (or identity) of whoever submitted the write.
    pub recorder: String,
}

impl DebateRecord {
    pub fn from_entry(id: u64, timestamp: DateTime<Utc>, entry: DebateEntry, recorder: &str) -> Self {
        Self {
            id,
            timestamp,
            symbol: entry.symbol,
            analyst_view: entry.analyst_view,
            skeptic_view: entry.skeptic_view,
            degen_view: entry.degen_view,
            consensus: entry.consensus,
            final_confidence: entry.final_confidence,
            recorder: recorder.to_string(),
        }
    }

    /// Decode the stored wire strings back into typed opinions.
    pub fn parse(&self) -> Result<ParsedDebate, ModelError> {
        Ok(ParsedDebate {
            id: self.id,
            timestamp: self.timestamp,
            symbol: self.symbol.clone(),
            analyst: self.analyst_view.parse()?,
            skeptic: self.skeptic_view.parse()?,
            degen: self.degen_view.parse()?,
            consensus: self.consensus.parse()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedDebate {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub analyst: AgentOpinion,
    pub skeptic: AgentOpinion,
    pub degen: AgentOpinion,
    pub consensus: ConsensusSummary,
}

/// Confirmation of a ledger write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Decision distribution across a window of recorded debates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebateStats {
    pub debates: usize,
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
    pub unanimous: usize,
    pub average_confidence: Option<f64>,
}

impl DebateStats {
    pub fn from_debates(debates: &[ParsedDebate]) -> Self {
        let mut stats = DebateStats {
            debates: debates.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0u64;
        for debate in debates {
            match debate.consensus.decision {
                Decision::Buy => stats.buy += 1,
                Decision::Sell => stats.sell += 1,
                Decision::Hold => stats.hold += 1,
            }
            if debate.consensus.agreement == crate::consensus::Agreement::Unanimous {
                stats.unanimous += 1;
            }
            confidence_sum += u64::from(debate.consensus.average_confidence);
        }
        if !debates.is_empty() {
            stats.average_confidence = Some(confidence_sum as f64 / debates.len() as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Agreement;

    fn sample_record(id: u64, consensus: &str) -> DebateRecord {
        DebateRecord {
            id,
            timestamp: Utc::now(),
            symbol: "ETH".to_string(),
            analyst_view: "HOLD|60|Market consolidation pattern detected".to_string(),
            skeptic_view: "HOLD|55|Risk elevated, protect capital".to_string(),
            degen_view: "BUY|70|Momentum building, breakout imminent".to_string(),
            consensus: consensus.to_string(),
            final_confidence: 62,
            recorder: "0x0000000000000000000000000000000000000001".to_string(),
        }
    }

    #[test]
    fn parse_record() {
        let parsed = sample_record(1, "HOLD|MAJORITY|62").parse().unwrap();
        assert_eq!(parsed.analyst.decision, Decision::Hold);
        assert_eq!(parsed.degen.confidence, 70);
        assert_eq!(parsed.consensus.agreement, Agreement::Majority);
        assert_eq!(parsed.consensus.average_confidence, 62);
    }

    #[test]
    fn parse_record_with_corrupt_view() {
        let mut record = sample_record(1, "HOLD|MAJORITY|62");
        record.skeptic_view = "maybe".to_string();
        assert!(record.parse().is_err());
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(sample_record(7, "HOLD|MAJORITY|62")).unwrap();
        assert_eq!(json["analystView"], "HOLD|60|Market consolidation pattern detected");
        assert_eq!(json["finalConfidence"], 62);
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn stats_over_debates() {
        let debates = vec![
            sample_record(1, "HOLD|MAJORITY|62").parse().unwrap(),
            sample_record(2, "BUY|UNANIMOUS|80").parse().unwrap(),
            sample_record(3, "HOLD|SPLIT|50").parse().unwrap(),
        ];
        let stats = DebateStats::from_debates(&debates);
        assert_eq!(stats.debates, 3);
        assert_eq!(stats.hold, 2);
        assert_eq!(stats.buy, 1);
        assert_eq!(stats.sell, 0);
        assert_eq!(stats.unanimous, 1);
        assert_eq!(stats.average_confidence, Some(64.0));
    }

    #[test]
    fn stats_over_nothing() {
        let stats = DebateStats::from_debates(&[]);
        assert_eq!(stats.debates, 0);
        assert_eq!(stats.average_confidence, None);
    }
}
