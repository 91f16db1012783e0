use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Ledger is read-only: no signer configured")]
    ReadOnly,

    #[error("Debate not found: id={0}")]
    NotFound(u64),

    #[error("Failed to decode ledger value: {0}")]
    Decode(String),

    #[error("Ledger configuration error: {0}")]
    Config(String),
}
