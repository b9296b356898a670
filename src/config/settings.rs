use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selector: "postgres" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Pool acquire timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Per-call timeout for notification writes, in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Push gateway endpoint accepting {tokens, message} batches
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Per-call timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Worker pool size for bulk fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-call timeout for the primary-channel procedure, in seconds
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_seconds: u64,
    /// Initial retry backoff delay in milliseconds
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,
    /// Maximum retry backoff delay in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_storage_backend() -> String {
    "postgres".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/opsboard".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_write_timeout() -> u64 {
    5
}

fn default_gateway_url() -> String {
    "http://localhost:9040/push/send".to_string()
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_max_concurrency() -> usize {
    16
}

fn default_rpc_timeout() -> u64 {
    5
}

fn default_retry_initial_delay() -> u64 {
    100
}

fn default_retry_max_delay() -> u64 {
    5_000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("storage.backend", "postgres")?
            .set_default("storage.url", "postgres://localhost:5432/opsboard")?
            .set_default("storage.pool_size", 10)?
            .set_default("gateway.url", "http://localhost:9040/push/send")?
            .set_default("gateway.timeout_seconds", 10)?
            .set_default("dispatch.max_concurrency", 16)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // STORAGE_URL, GATEWAY_URL, DISPATCH_MAX_CONCURRENCY, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            write_timeout_seconds: default_write_timeout(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            timeout_seconds: default_gateway_timeout(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            rpc_timeout_seconds: default_rpc_timeout(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let storage = StorageConfig::default();
        assert_eq!(storage.backend, "postgres");
        assert_eq!(storage.pool_size, 10);

        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.max_concurrency, 16);
        assert_eq!(dispatch.rpc_timeout_seconds, 5);
    }
}
