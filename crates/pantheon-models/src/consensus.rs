use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::opinion::Decision;

/// How strongly the council agreed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Agreement {
    Unanimous,
    Majority,
    Split,
}

impl Agreement {
    /// 3 → UNANIMOUS, 2 → MAJORITY, anything else → SPLIT.
    pub fn from_max_votes(max_votes: u8) -> Self {
        match max_votes {
            3 => Agreement::Unanimous,
            2 => Agreement::Majority,
            _ => Agreement::Split,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Agreement::Unanimous => "UNANIMOUS",
            Agreement::Majority => "MAJORITY",
            Agreement::Split => "SPLIT",
        }
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Agreement {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNANIMOUS" => Ok(Agreement::Unanimous),
            "MAJORITY" => Ok(Agreement::Majority),
            "SPLIT" => Ok(Agreement::Split),
            other => Err(ModelError::InvalidAgreement(other.to_string())),
        }
    }
}

/// Vote tally across the three personas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub struct Votes {
    pub buy: u8,
    pub sell: u8,
    pub hold: u8,
}

impl Votes {
    pub fn get(&self, decision: Decision) -> u8 {
        match decision {
            Decision::Buy => self.buy,
            Decision::Sell => self.sell,
            Decision::Hold => self.hold,
        }
    }

    pub fn add(&mut self, decision: Decision) {
        match decision {
            Decision::Buy => self.buy += 1,
            Decision::Sell => self.sell += 1,
            Decision::Hold => self.hold += 1,
        }
    }

    pub fn total(&self) -> u8 {
        self.buy + self.sell + self.hold
    }

    pub fn max(&self) -> u8 {
        self.buy.max(self.sell).max(self.hold)
    }
}

/// The council's combined verdict for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Consensus {
    pub decision: Decision,
    pub agreement: Agreement,
    /// Mean of the three confidences, rounded half-up.
    pub average_confidence: u8,
    pub votes: Votes,
}

impl Consensus {
    /// Wire format: `DECISION|AGREEMENT|CONFIDENCE`.
    pub fn to_wire(&self) -> String {
        format!(
            "{}|{}|{}",
            self.decision, self.agreement, self.average_confidence
        )
    }

    pub fn summary(&self) -> ConsensusSummary {
        ConsensusSummary {
            decision: self.decision,
            agreement: self.agreement,
            average_confidence: self.average_confidence,
        }
    }
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// A consensus as recovered from its wire form (the vote tally is not recorded).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsensusSummary {
    pub decision: Decision,
    pub agreement: Agreement,
    pub average_confidence: u8,
}

impl FromStr for ConsensusSummary {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('|').collect();
        if parts.len() != 3 {
            return Err(ModelError::FieldCount {
                expected: 3,
                found: parts.len(),
            });
        }
        let raw_confidence = parts[2].trim();
        let average_confidence: u8 = raw_confidence
            .parse()
            .ok()
            .filter(|c| *c <= 100)
            .ok_or_else(|| ModelError::InvalidConfidence(raw_confidence.to_string()))?;

        Ok(Self {
            decision: parts[0].trim().parse()?,
            agreement: parts[1].trim().parse()?,
            average_confidence,
        })
    }
}
