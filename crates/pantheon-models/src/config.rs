use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration shared by the CLI and the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PantheonConfig {
    #[serde(default)]
    pub council: CouncilConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// How the three personas are consulted within a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// One persona at a time with `inter_call_delay_ms` between calls.
    /// Safer against a single shared API quota.
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CouncilConfig {
    /// Symbol debated every round.
    pub symbol: String,
    pub collection_mode: CollectionMode,
    /// Pause between persona calls in sequential mode.
    pub inter_call_delay_ms: u64,
    /// Watchdog for the collecting phase of a round.
    pub round_timeout_seconds: u64,
}

impl CouncilConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_seconds)
    }
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            symbol: "ETH".to_string(),
            collection_mode: CollectionMode::Sequential,
            inter_call_delay_ms: 8_000,
            round_timeout_seconds: 600,
        }
    }
}

/// Text-completion collaborator settings and the collector's retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    /// Total attempts per persona before the fallback opinion is used.
    pub max_attempts: u32,
    pub retry_backoff_seconds: u64,
    /// Wait applied instead of `retry_backoff_seconds` after a rate-limit reply.
    pub rate_limit_backoff_seconds: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_seconds)
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            retry_backoff_seconds: 15,
            rate_limit_backoff_seconds: 30,
            temperature: 0.7,
            max_output_tokens: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub rsi_period: usize,
    /// Days of price history fetched for the RSI calculation.
    pub history_days: u32,
    /// Ticker symbol → CoinGecko coin id.
    pub coin_ids: BTreeMap<String, String>,
    /// Synthesize a snapshot when the provider is unreachable instead of abandoning the round.
    pub synthetic_fallback: bool,
}

impl MarketConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn coin_id(&self, symbol: &str) -> Option<&str> {
        self.coin_ids
            .get(&symbol.to_uppercase())
            .map(String::as_str)
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        let coin_ids = [("ETH", "ethereum"), ("BTC", "bitcoin")]
            .into_iter()
            .map(|(s, id)| (s.to_string(), id.to_string()))
            .collect();
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            timeout_seconds: 10,
            rsi_period: 14,
            history_days: 2,
            coin_ids,
            synthetic_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Write to the deployed contract over JSON-RPC.
    #[default]
    Contract,
    /// Keep debates in process memory (dry runs, demos without a chain).
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub mode: LedgerMode,
    pub rpc_url: String,
    pub contract_address: Option<String>,
    /// Environment variable holding the signer's private key. Without it the
    /// ledger is read-only.
    pub private_key_env: String,
    pub confirmation_timeout_seconds: u64,
    /// Maximum number of debate records kept in the in-memory read cache.
    pub cache_max_capacity: u64,
    /// How long a fetched debate count stays fresh.
    pub count_ttl_seconds: u64,
}

impl LedgerConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }

    pub fn count_ttl(&self) -> Duration {
        Duration::from_secs(self.count_ttl_seconds)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mode: LedgerMode::Contract,
            rpc_url: "https://rpc-amoy.polygon.technology/".to_string(),
            contract_address: None,
            private_key_env: "PRIVATE_KEY".to_string(),
            confirmation_timeout_seconds: 120,
            cache_max_capacity: 1_000,
            count_ttl_seconds: 15,
        }
    }
}
