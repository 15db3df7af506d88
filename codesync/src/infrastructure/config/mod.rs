// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Worker Configuration
//!
//! Layered configuration made of nested per-component settings structs,
//! each with a `Default` impl giving every field a value, loaded from a
//! TOML file with environment overrides. Layering is done with the
//! `config` crate: a TOML file is the base layer, `SYNC_`-prefixed
//! environment variables (double-underscore separated, e.g.
//! `SYNC_BATCH_EMBEDDER__BATCH_SIZE`) override individual fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use codesync_domain::error::SyncError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub connection_string: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connection_string: "sqlite://codesync.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "SYNC_EMBEDDING_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchEmbedderSettings {
    pub batch_size: usize,
    pub max_retries: u32,
    pub rate_limit: u32,
    pub time_window_secs: u64,
}

impl Default for BatchEmbedderSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_retries: 3,
            rate_limit: 10,
            time_window_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParallelProcessorSettings {
    pub max_workers: usize,
}

impl Default for ParallelProcessorSettings {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub timeout_secs: u64,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout_secs: 300,
            half_open_max_calls: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebouncerSettings {
    pub debounce_seconds: f64,
    pub max_batch_size: usize,
}

impl Default for DebouncerSettings {
    fn default() -> Self {
        Self {
            debounce_seconds: 2.0,
            max_batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthMonitorSettings {
    pub check_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub max_failures: u32,
}

impl Default for HealthMonitorSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 10,
            heartbeat_timeout_secs: 30,
            max_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerLoopSettings {
    pub poll_interval_secs: u64,
    pub periodic_sync_interval_secs: u64,
    pub max_concurrent: usize,
}

impl Default for WorkerLoopSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            periodic_sync_interval_secs: 3600,
            max_concurrent: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub bind_address: String,
    pub metrics_port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            metrics_port: 9090,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Top-level settings for the standalone worker binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub batch_embedder: BatchEmbedderSettings,
    pub parallel_processor: ParallelProcessorSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub debouncer: DebouncerSettings,
    pub health_monitor: HealthMonitorSettings,
    pub worker_loop: WorkerLoopSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

impl WorkerSettings {
    /// Loads settings from an optional TOML file, layered under
    /// `SYNC_`-prefixed environment variable overrides (double-underscore
    /// nested, e.g. `SYNC_HTTP__BIND_ADDRESS`). Falls back to defaults if
    /// `config_path` is `None` or does not exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self, SyncError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(config::File::new(
                    path.to_str().unwrap_or_default(),
                    config::FileFormat::Toml,
                ));
            } else {
                tracing::warn!("config file not found at {:?}, using defaults", path);
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| SyncError::InvalidConfiguration(format!("failed to build configuration: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| SyncError::InvalidConfiguration(format!("failed to parse configuration: {e}")))
    }
}
