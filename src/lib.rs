pub mod artifact;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod matrix;
pub mod verify;

pub use config::AuditConfig;
pub use error::AuditError;
