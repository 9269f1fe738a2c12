//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// ETL Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/movies_database";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default search index base URL.
pub const DEFAULT_ELASTICSEARCH_URL: &str = "http://localhost:9200";

/// Default number of aggregates pulled per extract call.
pub const DEFAULT_BATCH_SIZE: i64 = 100;

/// Default sleep between polling passes once all streams are caught up.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default path of the persisted cursor state file.
pub const DEFAULT_STATE_FILE: &str = "./etl_state.json";

/// Default directory holding the static index mapping files.
pub const DEFAULT_SCHEMA_DIR: &str = "./schemas";

/// Default initial delay for transient-error retries, in milliseconds.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Default upper bound on the retry delay, in milliseconds.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// ETL service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineConfig,
}

/// Relational source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    pub schema_dir: String,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: i64,
    pub poll_interval_secs: u64,
    pub state_file: String,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            search: SearchConfig {
                url: std::env::var("ETL_ELASTICSEARCH_URL")
                    .unwrap_or_else(|_| DEFAULT_ELASTICSEARCH_URL.to_string()),
                schema_dir: std::env::var("ETL_SCHEMA_DIR")
                    .unwrap_or_else(|_| DEFAULT_SCHEMA_DIR.to_string()),
            },
            pipeline: PipelineConfig {
                batch_size: std::env::var("ETL_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BATCH_SIZE),
                poll_interval_secs: std::env::var("ETL_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                state_file: std::env::var("ETL_STATE_FILE")
                    .unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string()),
                retry_initial_delay_ms: std::env::var("ETL_RETRY_INITIAL_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_INITIAL_DELAY_MS),
                retry_max_delay_ms: std::env::var("ETL_RETRY_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.search.url.is_empty() {
            anyhow::bail!("Search index URL cannot be empty");
        }

        if self.pipeline.batch_size <= 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.pipeline.retry_initial_delay_ms == 0 {
            anyhow::bail!("Retry initial delay must be greater than 0");
        }

        if self.pipeline.retry_max_delay_ms < self.pipeline.retry_initial_delay_ms {
            anyhow::bail!(
                "Retry max delay ({}ms) cannot be smaller than initial delay ({}ms)",
                self.pipeline.retry_max_delay_ms,
                self.pipeline.retry_initial_delay_ms
            );
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            search: SearchConfig {
                url: DEFAULT_ELASTICSEARCH_URL.to_string(),
                schema_dir: DEFAULT_SCHEMA_DIR.to_string(),
            },
            pipeline: PipelineConfig {
                batch_size: DEFAULT_BATCH_SIZE,
                poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
                state_file: DEFAULT_STATE_FILE.to_string(),
                retry_initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
                retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delays_must_be_ordered() {
        let mut config = Config::default();
        config.pipeline.retry_initial_delay_ms = 5_000;
        config.pipeline.retry_max_delay_ms = 1_000;
        assert!(config.validate().is_err());
    }
}
