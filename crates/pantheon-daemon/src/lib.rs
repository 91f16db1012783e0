//! Long-running Pantheon Council service: a timer that runs debate rounds
//! and an HTTP API over the ledger.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;

pub use config::{DaemonConfig, ScheduleConfig, ServerConfig};
pub use error::DaemonError;
pub use scheduler::{Scheduler, SchedulerStats, TickOutcome};
pub use server::{router, serve, AppState};
