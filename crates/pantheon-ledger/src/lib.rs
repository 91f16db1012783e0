pub mod cached;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod memory;

pub use cached::CachedLedger;
pub use contract::{ContractLedger, LedgerHealth};
pub use error::LedgerError;
pub use ledger::{recent_ids, Ledger};
pub use memory::MemoryLedger;
