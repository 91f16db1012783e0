//! Pantheon Council - three AI personas debate a market, a majority vote
//! decides, and the verdict is written to an on-chain ledger.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! # async fn run() -> anyhow::Result<()> {
//! let config = pantheon::load_config("config/pantheon.toml")?;
//! let ledger = pantheon::build_ledger(&config.ledger)?;
//! let driver = pantheon::build_driver(&config, ledger.ledger.clone())?;
//! let report = driver.run_round().await?;
//! println!("{}", report.consensus);
//! # Ok(())
//! # }
//! ```

pub use pantheon_agents as agents;
pub use pantheon_ledger as ledger;
pub use pantheon_models as models;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pantheon_agents::{CoinGeckoSource, GeminiClient, RoundDriver};
use pantheon_ledger::{CachedLedger, ContractLedger, Ledger, MemoryLedger};
use pantheon_models::{DebateRecord, LedgerConfig, LedgerMode, PantheonConfig, ParsedDebate};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound for history windows served to operators.
pub const MAX_HISTORY: u64 = 50;
pub const DEFAULT_HISTORY: u64 = 10;

/// Install the stderr subscriber (respects `RUST_LOG`).
pub fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read a TOML configuration file. Sections this crate does not know about
/// are ignored, so the daemon's file can be shared.
pub fn load_config(path: impl AsRef<Path>) -> Result<PantheonConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Read a secret from the environment (after `.env` has been loaded).
/// Unset and blank variables are treated the same.
pub fn read_secret(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value)),
        _ => None,
    }
}

/// The configured ledger behind a read cache, plus direct access to the
/// contract client for health checks.
#[derive(Clone)]
pub struct LedgerHandle {
    pub ledger: Arc<dyn Ledger>,
    pub contract: Option<Arc<ContractLedger>>,
}

pub fn build_ledger(config: &LedgerConfig) -> Result<LedgerHandle> {
    let (inner, contract): (Arc<dyn Ledger>, Option<Arc<ContractLedger>>) = match config.mode {
        LedgerMode::Memory => {
            warn!("Using in-memory ledger, debates will not survive a restart");
            (Arc::new(MemoryLedger::new()) as Arc<dyn Ledger>, None)
        }
        LedgerMode::Contract => {
            let address = config
                .contract_address
                .as_deref()
                .context("ledger.contract_address is required in contract mode")?;
            let key = read_secret(&config.private_key_env);
            if key.is_none() {
                warn!(
                    env = %config.private_key_env,
                    "No signer key configured, ledger is read-only"
                );
            }
            let contract = Arc::new(
                ContractLedger::connect(
                    &config.rpc_url,
                    address,
                    key.as_ref(),
                    config.confirmation_timeout(),
                )
                .context("Failed to connect to ledger contract")?,
            );
            (contract.clone() as Arc<dyn Ledger>, Some(contract))
        }
    };

    let ledger = Arc::new(CachedLedger::new(
        inner,
        config.cache_max_capacity,
        config.count_ttl(),
    ));
    Ok(LedgerHandle { ledger, contract })
}

/// Build a round driver wired to Gemini, CoinGecko and the given ledger.
pub fn build_driver(config: &PantheonConfig, ledger: Arc<dyn Ledger>) -> Result<RoundDriver> {
    let api_key = read_secret(&config.completion.api_key_env)
        .with_context(|| format!("{} is not set", config.completion.api_key_env))?;
    let completion =
        GeminiClient::new(&config.completion, api_key).context("Failed to build completion client")?;
    let market =
        CoinGeckoSource::new(config.market.clone()).context("Failed to build market source")?;

    info!(
        symbol = %config.council.symbol,
        model = %config.completion.model,
        ledger = ledger.name(),
        mode = ?config.council.collection_mode,
        "Round driver ready"
    );

    Ok(RoundDriver::new(
        Arc::new(market),
        Arc::new(completion),
        ledger,
        config,
    ))
}

/// Clamp a requested history window to `1..=MAX_HISTORY`.
pub fn history_limit(requested: Option<u64>) -> u64 {
    requested.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY)
}

/// A stored debate together with its decoded form. `parsed` is `None` when
/// the stored strings do not decode, e.g. rows written by other tools.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateView {
    #[serde(flatten)]
    pub record: DebateRecord,
    pub parsed: Option<ParsedDebate>,
}

impl From<DebateRecord> for DebateView {
    fn from(record: DebateRecord) -> Self {
        let parsed = match record.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(id = record.id, error = %e, "Stored debate does not decode");
                None
            }
        };
        Self { record, parsed }
    }
}
