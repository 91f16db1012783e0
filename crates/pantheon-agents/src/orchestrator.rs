use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use pantheon_ledger::Ledger;
use pantheon_models::{
    AgentOpinion, CollectionMode, Consensus, CouncilConfig, DebateRecord, LedgerReceipt,
    MarketSnapshot, PantheonConfig,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::collector::{CollectedOpinion, OpinionCollector, RetryPolicy};
use crate::completion::CompletionClient;
use crate::consensus::aggregate;
use crate::error::RoundError;
use crate::market::{synthetic_snapshot, MarketSource};
use crate::prompts::{ANALYST, DEGEN, SKEPTIC};
use crate::recorder::Recorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    Idle,
    Collecting,
    Aggregating,
    Recording,
}

/// Exclusive right to run one round. Dropping it returns the driver to
/// `Idle`, whichever way the round ended.
pub struct RoundPermit {
    round_id: Uuid,
    state: Arc<Mutex<RoundState>>,
}

impl RoundPermit {
    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    fn advance(&self, next: RoundState) {
        *lock(&self.state) = next;
    }
}

impl Drop for RoundPermit {
    fn drop(&mut self) {
        *lock(&self.state) = RoundState::Idle;
    }
}

/// Everything produced by one successful round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round_id: Uuid,
    pub symbol: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub snapshot: MarketSnapshot,
    /// Analyst, skeptic, degen.
    pub opinions: Vec<CollectedOpinion>,
    pub consensus: Consensus,
    pub receipt: LedgerReceipt,
    pub record: Option<DebateRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverStatus {
    pub state: RoundState,
    pub symbol: String,
    pub rounds_recorded: u64,
    pub rounds_failed: u64,
    pub last_error: Option<String>,
    /// Last round that reached the ledger.
    pub last_round: Option<RoundReport>,
}

#[derive(Debug, Default)]
struct DriverStats {
    rounds_recorded: u64,
    rounds_failed: u64,
    last_error: Option<String>,
    last_round: Option<RoundReport>,
}

/// Runs Collect → Aggregate → Record, one round at a time.
pub struct RoundDriver {
    market: Arc<dyn MarketSource>,
    collector: OpinionCollector,
    recorder: Recorder,
    council: CouncilConfig,
    synthetic_fallback: bool,
    state: Arc<Mutex<RoundState>>,
    stats: Mutex<DriverStats>,
}

impl RoundDriver {
    pub fn new(
        market: Arc<dyn MarketSource>,
        completion: Arc<dyn CompletionClient>,
        ledger: Arc<dyn Ledger>,
        config: &PantheonConfig,
    ) -> Self {
        Self {
            market,
            collector: OpinionCollector::new(completion, RetryPolicy::from(&config.completion)),
            recorder: Recorder::new(ledger),
            council: config.council.clone(),
            synthetic_fallback: config.market.synthetic_fallback,
            state: Arc::new(Mutex::new(RoundState::Idle)),
            stats: Mutex::new(DriverStats::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.council.symbol
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        Arc::clone(self.recorder.ledger())
    }

    pub fn state(&self) -> RoundState {
        *lock(&self.state)
    }

    /// Claim the driver if no round is in flight.
    pub fn try_begin(&self) -> Option<RoundPermit> {
        let mut state = lock(&self.state);
        if *state != RoundState::Idle {
            return None;
        }
        *state = RoundState::Collecting;
        Some(RoundPermit {
            round_id: Uuid::new_v4(),
            state: Arc::clone(&self.state),
        })
    }

    pub async fn run_round(&self) -> Result<RoundReport, RoundError> {
        let permit = self.try_begin().ok_or(RoundError::InFlight)?;
        self.run_with_permit(permit).await
    }

    /// Run a round already claimed with [`RoundDriver::try_begin`].
    pub async fn run_with_permit(&self, permit: RoundPermit) -> Result<RoundReport, RoundError> {
        let result = self.execute(&permit).await;

        {
            let mut stats = lock(&self.stats);
            match &result {
                Ok(report) => {
                    stats.rounds_recorded += 1;
                    stats.last_error = None;
                    stats.last_round = Some(report.clone());
                }
                Err(e) => {
                    stats.rounds_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        }

        drop(permit);
        result
    }

    pub fn status(&self) -> DriverStatus {
        let stats = lock(&self.stats);
        DriverStatus {
            state: self.state(),
            symbol: self.council.symbol.clone(),
            rounds_recorded: stats.rounds_recorded,
            rounds_failed: stats.rounds_failed,
            last_error: stats.last_error.clone(),
            last_round: stats.last_round.clone(),
        }
    }

    async fn execute(&self, permit: &RoundPermit) -> Result<RoundReport, RoundError> {
        let round_id = permit.round_id();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(round_id = %round_id, symbol = %self.council.symbol, "Round started");

        let watchdog = self.council.round_timeout();
        let (snapshot, collected) = tokio::time::timeout(watchdog, self.collect())
            .await
            .map_err(|_| {
                warn!(round_id = %round_id, timeout_secs = watchdog.as_secs(), "Round watchdog fired during collection");
                RoundError::Timeout(watchdog.as_secs())
            })??;

        permit.advance(RoundState::Aggregating);
        let opinions: [AgentOpinion; 3] = collected.each_ref().map(|c| c.opinion.clone());
        let consensus = aggregate(&opinions);
        info!(
            round_id = %round_id,
            consensus = %consensus,
            buy = consensus.votes.buy,
            sell = consensus.votes.sell,
            hold = consensus.votes.hold,
            "Consensus reached"
        );

        permit.advance(RoundState::Recording);
        let recorded = self
            .recorder
            .record(&snapshot.symbol, &opinions, &consensus)
            .await
            .map_err(|e| {
                error!(round_id = %round_id, error = %e, "Failed to record debate");
                RoundError::Ledger(e)
            })?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            round_id = %round_id,
            tx = %recorded.receipt.tx_hash,
            elapsed_ms,
            "Round complete"
        );

        Ok(RoundReport {
            round_id,
            symbol: snapshot.symbol.clone(),
            started_at,
            elapsed_ms,
            snapshot,
            opinions: collected.into(),
            consensus,
            receipt: recorded.receipt,
            record: recorded.record,
        })
    }

    async fn collect(&self) -> Result<(MarketSnapshot, [CollectedOpinion; 3]), RoundError> {
        let snapshot = self.fetch_snapshot().await?;
        info!(
            symbol = %snapshot.symbol,
            price = %snapshot.price,
            change_24h = %snapshot.change_24h,
            rsi = %snapshot.rsi,
            synthetic = snapshot.synthetic,
            "Consulting council"
        );

        let collected = match self.council.collection_mode {
            CollectionMode::Sequential => {
                let delay = self.council.inter_call_delay();
                let analyst = self.collector.collect(&ANALYST, &snapshot).await;
                tokio::time::sleep(delay).await;
                let skeptic = self.collector.collect(&SKEPTIC, &snapshot).await;
                tokio::time::sleep(delay).await;
                let degen = self.collector.collect(&DEGEN, &snapshot).await;
                [analyst, skeptic, degen]
            }
            CollectionMode::Concurrent => {
                let (analyst, skeptic, degen) = tokio::join!(
                    self.collector.collect(&ANALYST, &snapshot),
                    self.collector.collect(&SKEPTIC, &snapshot),
                    self.collector.collect(&DEGEN, &snapshot),
                );
                [analyst, skeptic, degen]
            }
        };
        Ok((snapshot, collected))
    }

    async fn fetch_snapshot(&self) -> Result<MarketSnapshot, RoundError> {
        let symbol = &self.council.symbol;
        match self.market.snapshot(symbol).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if self.synthetic_fallback => {
                warn!(
                    source = self.market.name(),
                    symbol = %symbol,
                    error = %e,
                    "Market data unavailable, using synthetic snapshot"
                );
                Ok(synthetic_snapshot(symbol, &mut rand::thread_rng())?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_snapshot, ScriptedCompletion, StaticMarket};
    use pantheon_ledger::MemoryLedger;
    use rust_decimal_macros::dec;

    fn driver() -> RoundDriver {
        RoundDriver::new(
            Arc::new(StaticMarket::new(sample_snapshot(dec!(1)))),
            Arc::new(ScriptedCompletion::always("HOLD|50|Flat")),
            Arc::new(MemoryLedger::new()),
            &PantheonConfig::default(),
        )
    }

    #[test]
    fn second_permit_is_refused() {
        let driver = driver();
        let permit = driver.try_begin().unwrap();
        assert_eq!(driver.state(), RoundState::Collecting);
        assert!(driver.try_begin().is_none());

        drop(permit);
        assert_eq!(driver.state(), RoundState::Idle);
        assert!(driver.try_begin().is_some());
    }

    #[test]
    fn permit_advances_state() {
        let driver = driver();
        let permit = driver.try_begin().unwrap();
        permit.advance(RoundState::Recording);
        assert_eq!(driver.state(), RoundState::Recording);
        assert!(driver.try_begin().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn run_round_rejects_overlap() {
        let driver = driver();
        let _permit = driver.try_begin().unwrap();
        assert!(matches!(driver.run_round().await, Err(RoundError::InFlight)));
        assert_eq!(driver.status().rounds_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn status_reflects_success() {
        let driver = driver();
        let report = driver.run_round().await.unwrap();
        assert_eq!(report.consensus.to_wire(), "HOLD|UNANIMOUS|50");

        let status = driver.status();
        assert_eq!(status.state, RoundState::Idle);
        assert_eq!(status.rounds_recorded, 1);
        assert_eq!(status.symbol, "ETH");
        assert_eq!(status.last_round.unwrap().round_id, report.round_id);
    }
}
