pub mod config;
pub mod consensus;
pub mod debate;
pub mod error;
pub mod market;
pub mod opinion;

pub use config::{
    CollectionMode, CompletionConfig, CouncilConfig, LedgerConfig, LedgerMode, MarketConfig,
    PantheonConfig,
};
pub use consensus::{Agreement, Consensus, ConsensusSummary, Votes};
pub use debate::{DebateEntry, DebateRecord, DebateStats, LedgerReceipt, ParsedDebate};
pub use error::ModelError;
pub use market::MarketSnapshot;
pub use opinion::{AgentOpinion, Decision};
