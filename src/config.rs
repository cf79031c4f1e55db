use serde::{Deserialize, Serialize};
use std::env;

use crate::error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_page_size: i64,
    pub integrity_check_interval_secs: u64,
    pub alert_recipient: String,
    pub key_dir: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://gateway_log.db?mode=rwc".to_string());

        let max_page_size = env::var("LEDGER_MAX_PAGE_SIZE")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .map_err(|e| LedgerError::ConfigError(format!("Invalid LEDGER_MAX_PAGE_SIZE: {}", e)))?;

        let integrity_check_interval_secs = env::var("INTEGRITY_CHECK_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|e| {
                LedgerError::ConfigError(format!("Invalid INTEGRITY_CHECK_INTERVAL_SECS: {}", e))
            })?;

        let alert_recipient = env::var("ALERT_RECIPIENT")
            .unwrap_or_else(|_| "ledger-operators".to_string());

        let key_dir = env::var("KEY_DIR").ok();

        Ok(AppConfig {
            database_url,
            max_page_size,
            integrity_check_interval_secs,
            alert_recipient,
            key_dir,
        })
    }
}
