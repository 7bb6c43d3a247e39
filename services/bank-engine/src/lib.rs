pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod security;
pub mod services;

pub use config::Config;
pub use errors::{BankError, Result};
