pub mod alert;
pub mod canonical;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod ledger;
pub mod query;
pub mod registry;

pub use error::LedgerError;
