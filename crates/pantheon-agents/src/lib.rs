pub mod collector;
pub mod completion;
pub mod consensus;
pub mod error;
pub mod gemini;
pub mod market;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod recorder;
pub mod rsi;

pub mod test_support;

pub use collector::{fallback_opinion, CollectedOpinion, OpinionCollector, OpinionOrigin, RetryPolicy};
pub use completion::CompletionClient;
pub use consensus::aggregate;
pub use error::{AgentError, MarketError, RoundError};
pub use gemini::GeminiClient;
pub use market::{CoinGeckoSource, MarketSource};
pub use orchestrator::{DriverStatus, RoundDriver, RoundPermit, RoundReport, RoundState};
pub use prompts::{Persona, COUNCIL};
pub use recorder::{RecordedDebate, Recorder};
