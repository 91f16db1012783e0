use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("expected {expected} pipe-delimited fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid decision token: {0:?}")]
    InvalidDecision(String),

    #[error("invalid agreement token: {0:?}")]
    InvalidAgreement(String),

    #[error("confidence is not an integer: {0:?}")]
    InvalidConfidence(String),

    #[error("confidence {value} outside [{min}, {max}]")]
    ConfidenceOutOfRange { value: u64, min: u8, max: u8 },

    #[error("reasoning is empty")]
    EmptyReasoning,

    #[error("expected a single line, found {0}")]
    MultiLine(usize),

    #[error("market field {0} is not a finite number")]
    NonFinite(&'static str),

    #[error("RSI {0} outside [0, 100]")]
    RsiOutOfRange(String),
}
