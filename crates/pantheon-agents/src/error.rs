use pantheon_ledger::LedgerError;
use pantheon_models::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Completion transport error: {0}")]
    Transport(String),

    #[error("Completion timed out after {0} seconds")]
    Timeout(u64),

    #[error("Completion rate limited: {0}")]
    RateLimited(String),

    #[error("Completion returned no text")]
    EmptyReply,

    #[error("Invalid opinion reply: {0}")]
    Validation(#[from] ModelError),

    #[error("Completion API rejected credentials: {0}")]
    Auth(String),

    #[error("Completion API rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Completion client misconfigured: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether another attempt could succeed. Credential, configuration and
    /// request-shape failures repeat identically, so they are not retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AgentError::Auth(_) | AgentError::Config(_) | AgentError::Rejected { .. }
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AgentError::RateLimited(_))
    }
}

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Market data request failed: {0}")]
    Http(String),

    #[error("Market data provider returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode market data: {0}")]
    Decode(String),

    #[error("No coin id configured for symbol {0}")]
    UnknownSymbol(String),

    #[error("Market data rejected: {0}")]
    NonFinite(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum RoundError {
    #[error("A round is already in flight")]
    InFlight,

    #[error("Market data unavailable: {0}")]
    Market(#[from] MarketError),

    #[error("Ledger write failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Opinion collection exceeded the {0}s round watchdog")]
    Timeout(u64),
}
