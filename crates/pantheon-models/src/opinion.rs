use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 100;
/// Reasoning longer than this is cut on a char boundary.
pub const MAX_REASONING_CHARS: usize = 120;

/// A persona's trading call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Buy, Decision::Sell, Decision::Hold];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Buy => "BUY",
            Decision::Sell => "SELL",
            Decision::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire tokens are exact: `BUY`, `SELL` or `HOLD`.
impl FromStr for Decision {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Decision::Buy),
            "SELL" => Ok(Decision::Sell),
            "HOLD" => Ok(Decision::Hold),
            other => Err(ModelError::InvalidDecision(other.to_string())),
        }
    }
}

/// One persona's opinion for a round. Wire format: `DECISION|CONFIDENCE|REASONING`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentOpinion {
    pub decision: Decision,
    /// 1 to 100.
    pub confidence: u8,
    pub reasoning: String,
}

impl AgentOpinion {
    /// Build an opinion, enforcing the confidence range and cleaning the
    /// reasoning so it cannot break the pipe-delimited wire format.
    pub fn new(
        decision: Decision,
        confidence: u8,
        reasoning: impl Into<String>,
    ) -> Result<Self, ModelError> {
        check_confidence(u64::from(confidence))?;
        let reasoning = sanitize_reasoning(&reasoning.into());
        if reasoning.is_empty() {
            return Err(ModelError::EmptyReasoning);
        }
        Ok(Self {
            decision,
            confidence,
            reasoning,
        })
    }

    pub fn to_wire(&self) -> String {
        format!("{}|{}|{}", self.decision, self.confidence, self.reasoning)
    }
}

impl fmt::Display for AgentOpinion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl FromStr for AgentOpinion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line_count = s.lines().filter(|l| !l.trim().is_empty()).count();
        if line_count > 1 {
            return Err(ModelError::MultiLine(line_count));
        }

        let parts: Vec<&str> = s.trim().split('|').collect();
        if parts.len() != 3 {
            return Err(ModelError::FieldCount {
                expected: 3,
                found: parts.len(),
            });
        }

        let decision: Decision = parts[0].trim().parse()?;
        let confidence = parse_confidence(parts[1].trim())?;
        let reasoning = parts[2].trim();
        if reasoning.is_empty() {
            return Err(ModelError::EmptyReasoning);
        }

        Ok(Self {
            decision,
            confidence,
            reasoning: truncate_chars(reasoning, MAX_REASONING_CHARS),
        })
    }
}

/// Parse a confidence token. Only plain ASCII digits are accepted, so
/// `80.5`, `+80`, `80%` and `-1` are all rejected.
pub fn parse_confidence(raw: &str) -> Result<u8, ModelError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModelError::InvalidConfidence(raw.to_string()));
    }
    let value: u64 = raw
        .parse()
        .map_err(|_| ModelError::InvalidConfidence(raw.to_string()))?;
    check_confidence(value)?;
    Ok(value as u8)
}

fn check_confidence(value: u64) -> Result<(), ModelError> {
    if value < u64::from(MIN_CONFIDENCE) || value > u64::from(MAX_CONFIDENCE) {
        return Err(ModelError::ConfidenceOutOfRange {
            value,
            min: MIN_CONFIDENCE,
            max: MAX_CONFIDENCE,
        });
    }
    Ok(())
}

fn sanitize_reasoning(raw: &str) -> String {
    let flattened: String = raw
        .chars()
        .map(|c| match c {
            '|' => '/',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();
    truncate_chars(flattened.trim(), MAX_REASONING_CHARS)
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
