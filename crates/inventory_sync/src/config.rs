use config::{Config, ConfigError, Environment};
use inventory_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Name of the inventory table. Not validated here; a bad name fails on first store use.
    #[serde(default)]
    pub table: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inventory store backend (postgres, memory)
    #[serde(default = "default_store_backend")]
    pub store_backend: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying inventory notifications
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Subject filter for the inventory consumer
    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Create the stream at startup if it is missing
    #[serde(default)]
    pub nats_ensure_stream: bool,

    /// Nak messages whose store mutation failed so they are redelivered
    #[serde(default = "default_nak_on_mutation_failure")]
    pub nak_on_mutation_failure: bool,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // Reconciliation configuration
    /// Records requested per scan page
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,

    /// Seconds between reconciliation passes
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Reconciliation mode (collect, streaming)
    #[serde(default = "default_reconcile_mode")]
    pub reconcile_mode: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_backend() -> String {
    "postgres".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "inventory_events".to_string()
}

fn default_nats_subject() -> String {
    "inventory_events.>".to_string()
}

fn default_nats_consumer_name() -> String {
    "inventory-sync-consumer".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_nak_on_mutation_failure() -> bool {
    true
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "inventory".to_string()
}

fn default_postgres_username() -> String {
    "inventory".to_string()
}

fn default_postgres_password() -> String {
    "inventory".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

// Reconciliation defaults
fn default_scan_page_size() -> usize {
    100
}

fn default_reconcile_interval_secs() -> u64 {
    300
}

fn default_reconcile_mode() -> String {
    "collect".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "inventory-sync".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("INVENTORY"))
            .build()?
            .try_deserialize()
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::remove_var("INVENTORY_TABLE");
        std::env::remove_var("INVENTORY_LOG_LEVEL");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.table, "");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store_backend, "postgres");
        assert_eq!(config.nats_stream, "inventory_events");
        assert_eq!(config.scan_page_size, 100);
        assert_eq!(config.reconcile_mode, "collect");
        assert!(config.nak_on_mutation_failure);
        assert!(!config.otel_enabled);
    }

    #[test]
    fn test_table_from_env() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("INVENTORY_TABLE", "configuration");
        std::env::set_var("INVENTORY_LOG_LEVEL", "debug");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.table, "configuration");
        assert_eq!(config.log_level, "debug");

        std::env::remove_var("INVENTORY_TABLE");
        std::env::remove_var("INVENTORY_LOG_LEVEL");
    }

    #[test]
    fn test_postgres_config_mapping() {
        let _lock = TEST_LOCK.lock().unwrap();

        let config = ServiceConfig::from_env().unwrap();
        let pg = config.postgres_config();

        assert_eq!(pg.host, config.postgres_host);
        assert_eq!(pg.port, config.postgres_port);
        assert_eq!(pg.max_pool_size, config.postgres_max_pool_size);
    }
}
