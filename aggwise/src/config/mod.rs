//! Configuration management for aggwise
//!
//! Default config location: ~/.aggwise/config.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store; data is lost on restart
    #[default]
    Memory,
    Elasticsearch,
}

/// Where queries are executed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_store_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "orders_pagination".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
            index: default_index(),
            timeout_ms: default_timeout_ms(),
            username: None,
            password: None,
        }
    }
}

/// Knobs for the order analytics operations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// Window for the "recent orders" statistics, in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_top_customers")]
    pub top_customers: usize,
    #[serde(default = "default_status_buckets")]
    pub status_buckets: usize,
    #[serde(default = "default_customer_buckets")]
    pub customer_buckets: usize,
    #[serde(default = "default_category_buckets")]
    pub category_buckets: usize,
    #[serde(default = "default_paid_status")]
    pub paid_status: String,
    /// Smallest order amount counted in daily sales
    #[serde(default = "default_min_daily_amount")]
    pub min_daily_amount: f64,
}

fn default_lookback_days() -> u32 {
    30
}

fn default_top_customers() -> usize {
    5
}

fn default_status_buckets() -> usize {
    10
}

fn default_customer_buckets() -> usize {
    10
}

fn default_category_buckets() -> usize {
    5
}

fn default_paid_status() -> String {
    "PAID".to_string()
}

fn default_min_daily_amount() -> f64 {
    100.0
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            top_customers: default_top_customers(),
            status_buckets: default_status_buckets(),
            customer_buckets: default_customer_buckets(),
            category_buckets: default_category_buckets(),
            paid_status: default_paid_status(),
            min_daily_amount: default_min_daily_amount(),
        }
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable Prometheus metrics at GET /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,aggwise=debug".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: default_true(),
        }
    }
}

/// ~/.aggwise/config.toml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".aggwise"))
        .unwrap_or_else(|| PathBuf::from(".aggwise"))
        .join("config.toml")
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        let config_path = expand_tilde(config_path)?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            // Try to save default config
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(&config_path);
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the analytics operations cannot run with
    pub fn validate(&self) -> Result<()> {
        let a = &self.analytics;
        for (name, size) in [
            ("top_customers", a.top_customers),
            ("status_buckets", a.status_buckets),
            ("customer_buckets", a.customer_buckets),
            ("category_buckets", a.category_buckets),
        ] {
            if size == 0 {
                return Err(anyhow!("analytics.{name} must be a positive integer"));
            }
        }
        if self.store.timeout_ms == 0 {
            return Err(anyhow!("store.timeout_ms must be a positive integer"));
        }
        Ok(())
    }
}
