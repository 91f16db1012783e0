use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pantheon::{history_limit, DebateView};
use pantheon_models::DebateStats;
use serde::Serialize;
use tracing::warn;

/// Balance below which `check` warns that the signer may not afford gas.
const LOW_BALANCE: f64 = 0.01;

#[derive(Parser, Debug)]
#[command(name = "pantheon", about = "Pantheon Council operator CLI")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/pantheon.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one debate round now and print the report
    Debate,
    /// Show the most recent debate
    Latest,
    /// Show the number of recorded debates
    Count,
    /// Show one debate by id
    Show { id: u64 },
    /// Show recent debates, newest first
    History {
        #[arg(short, long)]
        limit: Option<u64>,
    },
    /// Decision distribution over recent debates
    Stats {
        #[arg(short, long)]
        limit: Option<u64>,
    },
    /// Check ledger connectivity and signer balance
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    pantheon::init_tracing(cli.log_json);

    let config = pantheon::load_config(&cli.config)?;
    let handle = pantheon::build_ledger(&config.ledger)?;
    let ledger = handle.ledger.clone();

    match cli.command {
        Command::Debate => {
            let driver = pantheon::build_driver(&config, ledger)
                .context("Failed to build round driver")?;
            let report = driver
                .run_round()
                .await
                .map_err(|e| anyhow::anyhow!("Round failed: {e}"))?;
            emit(&report, cli.pretty)?;
        }
        Command::Latest => match ledger.latest_debate().await? {
            Some(record) => emit(&DebateView::from(record), cli.pretty)?,
            None => emit(
                &serde_json::json!({"message": "No debates yet", "totalDebates": 0}),
                cli.pretty,
            )?,
        },
        Command::Count => {
            let total = ledger.total_debates().await?;
            emit(&serde_json::json!({"totalDebates": total}), cli.pretty)?;
        }
        Command::Show { id } => {
            let record = ledger
                .debate(id)
                .await
                .with_context(|| format!("Failed to read debate {id}"))?;
            emit(&DebateView::from(record), cli.pretty)?;
        }
        Command::History { limit } => {
            let records = ledger.recent_debates(history_limit(limit)).await?;
            let views: Vec<DebateView> = records.into_iter().map(DebateView::from).collect();
            emit(&views, cli.pretty)?;
        }
        Command::Stats { limit } => {
            let records = ledger.recent_debates(history_limit(limit)).await?;
            let parsed: Vec<_> = records.iter().filter_map(|r| r.parse().ok()).collect();
            emit(&DebateStats::from_debates(&parsed), cli.pretty)?;
        }
        Command::Check => {
            let Some(contract) = handle.contract else {
                let total = ledger.total_debates().await?;
                emit(
                    &serde_json::json!({"ledger": ledger.name(), "totalDebates": total}),
                    cli.pretty,
                )?;
                return Ok(());
            };
            let health = contract.health().await.context("Ledger health check failed")?;
            if let Some(balance) = &health.balance {
                if balance.parse::<f64>().map(|b| b < LOW_BALANCE).unwrap_or(false) {
                    warn!(balance = %balance, "Signer balance is low, writes may fail for lack of gas");
                }
            }
            emit(&health, cli.pretty)?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
