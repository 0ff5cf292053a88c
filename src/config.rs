//! TOML configuration with per-section defaults, an environment variable
//! override for the config file path, and a standard filesystem location.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the casebridge process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kafka: KafkaConfig,
    pub store: StoreConfig,
    pub thehive: HiveConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `CASEBRIDGE_CONFIG` environment variable.
    /// 2. `/etc/casebridge/casebridge.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("CASEBRIDGE_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CASEBRIDGE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new("/etc/casebridge/casebridge.toml");
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Kafka
// ---------------------------------------------------------------------------

/// Incident topic consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Bootstrap servers, comma-separated.
    pub servers: String,
    pub group_id: String,
    pub topics: Vec<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            servers: "localhost:9092".to_string(),
            group_id: "casebridge".to_string(),
            topics: vec!["soc-incidents".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Event store
// ---------------------------------------------------------------------------

/// HBase REST gateway and table layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the REST gateway.
    pub endpoint: String,
    pub namespace: String,
    pub raw_table: String,
    pub normalized_table: String,
    /// Connection pool capacity shared across lookups.
    pub pool_size: usize,
    pub request_timeout_sec: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            namespace: "soc".to_string(),
            raw_table: "raw_events".to_string(),
            normalized_table: "normalized_events".to_string(),
            pool_size: 5,
            request_timeout_sec: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TheHive
// ---------------------------------------------------------------------------

/// Case-management API endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    pub url: String,
    pub api_key: String,
    pub request_timeout_sec: u64,
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9000".to_string(),
            api_key: String::new(),
            request_timeout_sec: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics / logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address for the metrics and health listener.
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
