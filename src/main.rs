use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_log_agent::alert::LogAlertNotifier;
use gateway_log_agent::config::AppConfig;
use gateway_log_agent::crypto::EcdsaVerifier;
use gateway_log_agent::jobs::IntegrityJob;
use gateway_log_agent::ledger::{ChainVerifier, LedgerStore};
use gateway_log_agent::registry::InMemoryKeyRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_log_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gateway Log Agent");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded");

    // Initialize ledger store
    let store = LedgerStore::new(&config.database_url, Arc::new(EcdsaVerifier::new()))
        .await?
        .with_max_page_size(config.max_page_size);
    store.run_migrations().await?;
    let store = Arc::new(store);
    info!("Ledger store ready at {}", config.database_url);

    // Load the key registry, if a key directory is configured. The registry
    // is consumed by whatever write surface fronts this process; the daemon
    // itself only audits.
    if let Some(key_dir) = &config.key_dir {
        let registry = InMemoryKeyRegistry::from_key_dir(key_dir)?;
        info!("Key registry loaded: {} keys from {}", registry.len(), key_dir);
    }

    // Periodic integrity job
    let job = IntegrityJob::new(
        ChainVerifier::new(store.clone()),
        Arc::new(LogAlertNotifier),
        config.alert_recipient.clone(),
    );
    let interval_secs = config.integrity_check_interval_secs;
    info!("Integrity audits every {}s", interval_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = job.run_once().await {
                    error!("Integrity audit could not run: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
