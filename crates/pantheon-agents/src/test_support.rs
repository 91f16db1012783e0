//! Doubles for the round's collaborators: a scripted completion service, a
//! fixed market source and a ledger that fails on demand.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pantheon_ledger::{Ledger, LedgerError, MemoryLedger};
use pantheon_models::{
    AgentOpinion, DebateEntry, DebateRecord, Decision, LedgerReceipt, MarketSnapshot,
};
use rust_decimal::Decimal;

use crate::completion::CompletionClient;
use crate::error::{AgentError, MarketError};
use crate::market::MarketSource;

/// A snapshot with fixed figures and the given 24h change.
pub fn sample_snapshot(change_24h: Decimal) -> MarketSnapshot {
    MarketSnapshot {
        symbol: "ETH".to_string(),
        price: Decimal::new(345_678, 2),
        change_24h,
        volume_24h: Decimal::new(15_200_000_000, 0),
        rsi: Decimal::new(52, 0),
        captured_at: Utc::now(),
        synthetic: false,
    }
}

/// Panics on invalid input, which only happens in a broken test.
pub fn opinion(decision: Decision, confidence: u8, reasoning: &str) -> AgentOpinion {
    match AgentOpinion::new(decision, confidence, reasoning) {
        Ok(opinion) => opinion,
        Err(e) => panic!("invalid test opinion: {e}"),
    }
}

/// Completion service that replays a script of replies in order.
///
/// Once the script runs out, `repeat` is returned for every further call, or
/// a transport error when no repeat reply was given.
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, AgentError>>>,
    repeat: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(script: Vec<Result<String, AgentError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every call with the same reply.
    pub fn always(reply: &str) -> Self {
        let mut scripted = Self::new(Vec::new());
        scripted.repeat = Some(reply.to_string());
        scripted
    }

    /// Replies in sequence, one per call, then repeats the last one.
    pub fn replies(replies: &[&str]) -> Self {
        let mut scripted = Self::new(replies.iter().map(|r| Ok(r.to_string())).collect());
        scripted.repeat = replies.last().map(|r| r.to_string());
        scripted
    }

    /// Wait this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(reply) => reply,
            None => match &self.repeat {
                Some(reply) => Ok(reply.clone()),
                None => Err(AgentError::Transport("script exhausted".to_string())),
            },
        }
    }
}

/// Market source returning a fixed snapshot, or failing every call.
pub struct StaticMarket {
    snapshot: Option<MarketSnapshot>,
    calls: AtomicUsize,
}

impl StaticMarket {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            snapshot: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketSource for StaticMarket {
    fn name(&self) -> &str {
        "static"
    }

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, MarketError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.snapshot {
            Some(snapshot) => Ok(MarketSnapshot {
                symbol: symbol.to_uppercase(),
                captured_at: Utc::now(),
                ..snapshot.clone()
            }),
            None => Err(MarketError::Status(503)),
        }
    }
}

/// In-memory ledger with switchable failures.
///
/// `new()` rejects every write. `reads_only_fail()` accepts writes but fails
/// all reads. `failing_writes(n)` rejects the first `n` writes, then behaves.
pub struct FailingLedger {
    inner: MemoryLedger,
    fail_writes: AtomicUsize,
    fail_reads: bool,
    write_attempts: AtomicUsize,
}

impl FailingLedger {
    pub fn new() -> Self {
        Self::failing_writes(usize::MAX)
    }

    pub fn failing_writes(count: usize) -> Self {
        Self {
            inner: MemoryLedger::new(),
            fail_writes: AtomicUsize::new(count),
            fail_reads: false,
            write_attempts: AtomicUsize::new(0),
        }
    }

    pub fn reads_only_fail() -> Self {
        Self {
            inner: MemoryLedger::new(),
            fail_writes: AtomicUsize::new(0),
            fail_reads: true,
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Reject the next `count` writes.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_writes.store(count, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn read_guard(&self) -> Result<(), LedgerError> {
        if self.fail_reads {
            return Err(LedgerError::Rpc("read failed".to_string()));
        }
        Ok(())
    }
}

impl Default for FailingLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for FailingLedger {
    fn name(&self) -> &str {
        "failing"
    }

    async fn record_debate(&self, entry: &DebateEntry) -> Result<LedgerReceipt, LedgerError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(LedgerError::Rpc("nonce too low".to_string()));
        }
        self.inner.record_debate(entry).await
    }

    async fn total_debates(&self) -> Result<u64, LedgerError> {
        self.read_guard()?;
        self.inner.total_debates().await
    }

    async fn debate(&self, id: u64) -> Result<DebateRecord, LedgerError> {
        self.read_guard()?;
        self.inner.debate(id).await
    }
}
