//! One-shot chain integrity audit.
//!
//! Runs a full ledger verification and exits non-zero when the chain is
//! broken, so cron or a systemd timer can escalate on the exit status. A
//! broken chain also fires the alert notifier.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_log_agent::alert::LogAlertNotifier;
use gateway_log_agent::config::AppConfig;
use gateway_log_agent::crypto::EcdsaVerifier;
use gateway_log_agent::jobs::IntegrityJob;
use gateway_log_agent::ledger::{ChainVerifier, LedgerStore};

#[derive(Parser)]
#[command(name = "integrity-check")]
#[command(about = "Audit the gateway ledger's hash chain and exit non-zero on a break")]
struct Cli {
    /// Ledger database URL; defaults to DATABASE_URL or the standard path
    #[arg(long)]
    database_url: Option<String>,

    /// Alert recipient on failure; defaults to ALERT_RECIPIENT
    #[arg(long)]
    recipient: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_log_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let database_url = cli.database_url.unwrap_or(config.database_url);
    let recipient = cli.recipient.unwrap_or(config.alert_recipient);

    let store = LedgerStore::new(&database_url, Arc::new(EcdsaVerifier::new())).await?;
    store.run_migrations().await?;

    let job = IntegrityJob::new(
        ChainVerifier::new(Arc::new(store)),
        Arc::new(LogAlertNotifier),
        recipient,
    );

    let report = job.run_once().await?;
    println!("{}", report.summary());

    if !report.is_intact {
        std::process::exit(1);
    }
    Ok(())
}
