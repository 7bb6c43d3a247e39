use config::builder::{ConfigBuilder, DefaultState};
use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// In-process tables, lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = Self::defaults()?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("MINIBANK")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.workers", 4)?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("database.run_migrations", true)?
            .set_default(
                "cors.allowed_origins",
                vec!["http://localhost:3000", "http://127.0.0.1:5500"],
            )?
            .set_default("logging.json", false)?
            .set_default("logging.level", "info")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("At least one worker is required".to_string());
        }

        if self.database.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err("Database URL is required for the postgres backend".to_string());
        }

        if self.cors.allowed_origins.is_empty() {
            return Err("At least one allowed CORS origin is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = default_config();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert_eq!(config.database.acquire_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://localhost:3000", "http://127.0.0.1:5500"]
        );
        assert!(!config.logging.json);
    }

    #[test]
    fn test_postgres_backend_requires_url() {
        let mut config = default_config();
        assert!(config.validate().is_err());

        config.database.url = "postgres://localhost/minibank".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_backend_needs_no_url() {
        let config: Config = Config::defaults()
            .unwrap()
            .set_override("database.backend", "memory")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.backend, StorageBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let mut config = default_config();
        config.database.backend = StorageBackend::Memory;

        config.server.port = 0;
        assert!(config.validate().is_err());
        config.server.port = 3000;

        config.server.workers = 0;
        assert!(config.validate().is_err());
        config.server.workers = 1;

        config.cors.allowed_origins.clear();
        assert!(config.validate().is_err());
    }
}
