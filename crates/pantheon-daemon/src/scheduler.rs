use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pantheon_agents::{RoundDriver, RoundReport};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Recorded(Box<RoundReport>),
    /// Another round was still in flight.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SchedulerStats {
    pub running: bool,
    pub interval_seconds: u64,
    pub ticks_dispatched: u64,
    pub ticks_skipped: u64,
}

struct Shared {
    driver: Arc<RoundDriver>,
    rounds: TaskTracker,
    dispatched: AtomicU64,
    skipped: AtomicU64,
}

impl Shared {
    /// Claim the driver and run the round in the background. Returns false
    /// when a round is already in flight.
    fn dispatch(&self) -> bool {
        let Some(permit) = self.driver.try_begin() else {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            warn!(state = ?self.driver.state(), "Round still in flight, skipping tick");
            return false;
        };
        self.dispatched.fetch_add(1, Ordering::SeqCst);

        let driver = Arc::clone(&self.driver);
        self.rounds.spawn(async move {
            let round_id = permit.round_id();
            if let Err(e) = driver.run_with_permit(permit).await {
                error!(round_id = %round_id, error = %e, "Scheduled round failed");
            }
        });
        true
    }
}

/// Fixed-interval timer around a [`RoundDriver`].
///
/// `start` spawns the loop and `stop` cancels it. `tick` runs one round inline,
/// without any timer.
pub struct Scheduler {
    shared: Arc<Shared>,
    interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(driver: Arc<RoundDriver>, schedule: &ScheduleConfig) -> Self {
        Self::with_token(driver, schedule, CancellationToken::new())
    }

    /// Build a scheduler that also stops when `cancel` (or a parent token)
    /// is cancelled.
    pub fn with_token(
        driver: Arc<RoundDriver>,
        schedule: &ScheduleConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                rounds: TaskTracker::new(),
                dispatched: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            }),
            interval: schedule.interval(),
            initial_delay: schedule.initial_delay(),
            cancel,
            handle: Mutex::new(None),
        }
    }

    pub fn driver(&self) -> &Arc<RoundDriver> {
        &self.shared.driver
    }

    /// Tracker for background rounds. Other triggers spawn through it so
    /// `stop` waits for their rounds too.
    pub fn rounds(&self) -> TaskTracker {
        self.shared.rounds.clone()
    }

    /// Spawn the timer loop. Returns false if it is already running or the
    /// scheduler was stopped.
    pub fn start(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Ok(mut handle) = self.handle.lock() else {
            return false;
        };
        if handle.is_some() {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let interval = self.interval;
        let initial_delay = self.initial_delay;
        info!(
            interval_secs = interval.as_secs(),
            initial_delay_secs = initial_delay.as_secs(),
            symbol = %shared.driver.symbol(),
            "Scheduler starting"
        );
        *handle = Some(tokio::spawn(timer_loop(shared, interval, initial_delay, cancel)));
        true
    }

    /// Cancel the loop, then wait for it and for any round already
    /// dispatched to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task ended abnormally");
            }
        }

        let rounds = &self.shared.rounds;
        rounds.close();
        if !rounds.is_empty() {
            info!(in_flight = rounds.len(), "Waiting for dispatched rounds to finish");
        }
        rounds.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .lock()
                .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
                .unwrap_or(false)
    }

    /// Run one round now and wait for it.
    pub async fn tick(&self) -> TickOutcome {
        let driver = &self.shared.driver;
        let Some(permit) = driver.try_begin() else {
            self.shared.skipped.fetch_add(1, Ordering::SeqCst);
            info!("Round still in flight, tick skipped");
            return TickOutcome::Skipped;
        };
        self.shared.dispatched.fetch_add(1, Ordering::SeqCst);

        match driver.run_with_permit(permit).await {
            Ok(report) => TickOutcome::Recorded(Box::new(report)),
            Err(e) => {
                error!(error = %e, "Round failed");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.is_running(),
            interval_seconds: self.interval.as_secs(),
            ticks_dispatched: self.shared.dispatched.load(Ordering::SeqCst),
            ticks_skipped: self.shared.skipped.load(Ordering::SeqCst),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn timer_loop(
    shared: Arc<Shared>,
    interval: Duration,
    initial_delay: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            info!("Scheduler stopped before first round");
            return;
        }
        _ = tokio::time::sleep(initial_delay) => {}
    }

    loop {
        shared.dispatch();

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduler shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
