use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pantheon_daemon::config::DaemonConfig;
use pantheon_daemon::error::DaemonError;
use pantheon_daemon::scheduler::Scheduler;
use pantheon_daemon::server::{self, AppState};

#[derive(Parser, Debug)]
#[command(
    name = "pantheon-daemon",
    about = "Pantheon Council daemon - runs scheduled debate rounds and serves the ledger over HTTP"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/pantheon.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    pantheon::init_tracing(cli.log_json);

    let config = DaemonConfig::load(&cli.config)?;

    let ledger = pantheon::build_ledger(&config.pantheon.ledger)?;
    let driver = Arc::new(pantheon::build_driver(&config.pantheon, ledger.ledger.clone())?);

    let cancel = CancellationToken::new();

    // Handle shutdown signals
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
            cancel.cancel();
        });
    }

    let scheduler = if config.schedule.enabled {
        let scheduler = Arc::new(Scheduler::with_token(
            driver.clone(),
            &config.schedule,
            cancel.child_token(),
        ));
        scheduler.start();
        Some(scheduler)
    } else {
        tracing::info!("Scheduler disabled, rounds run only on trigger");
        None
    };

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;

    let state = AppState::new(driver, scheduler.clone());
    let rounds = state.rounds.clone();
    server::serve(listener, state, cancel.clone())
        .await
        .context("HTTP server failed")?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    // Rounds started by the trigger endpoint
    rounds.close();
    rounds.wait().await;

    tracing::info!("Pantheon daemon stopped");
    Ok(())
}
