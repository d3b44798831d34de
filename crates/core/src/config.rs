//! Engine configuration
//!
//! One immutable value built at startup and handed to each component at
//! construction. Tests build their own instances instead of touching
//! process-wide state.

use crate::domain::QueuePolicy;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queue: QueuePolicy,
    /// Recognized job kinds
    pub known_kinds: Vec<String>,
    pub worker: WorkerConfig,
    pub ingestion: IngestionConfig,
    pub paths: PathsConfig,
    pub backend: BackendConfig,
    pub rpc: RpcConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue: QueuePolicy::default(),
            known_kinds: ["T2I", "T2V", "SPEECH", "AUDIO", "3D"]
                .into_iter()
                .map(String::from)
                .collect(),
            worker: WorkerConfig::default(),
            ingestion: IngestionConfig::default(),
            paths: PathsConfig::default(),
            backend: BackendConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.queue
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if !(self.queue.min_priority..=self.queue.max_priority)
            .contains(&self.queue.default_priority)
        {
            return Err(AppError::Config(format!(
                "default_priority {} outside [{}, {}]",
                self.queue.default_priority, self.queue.min_priority, self.queue.max_priority
            )));
        }
        if self.queue.default_retry_limit < 0 {
            return Err(AppError::Config(
                "default_retry_limit must be >= 0".to_string(),
            ));
        }
        if self.known_kinds.is_empty() {
            return Err(AppError::Config("known_kinds must not be empty".to_string()));
        }
        // A lease shorter than the call it guards would be recovered mid-flight
        if self.worker.lease_duration_ms <= self.worker.backend_timeout_ms {
            return Err(AppError::Config(format!(
                "lease_duration_ms ({}) must exceed backend_timeout_ms ({})",
                self.worker.lease_duration_ms, self.worker.backend_timeout_ms
            )));
        }
        if self.ingestion.extensions.is_empty() {
            return Err(AppError::Config(
                "ingestion.extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Lease owner identity; generated at startup when absent
    pub worker_id: Option<String>,
    pub lease_duration_ms: u64,
    pub backend_timeout_ms: u64,
    pub idle_poll_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            lease_duration_ms: 330_000,
            backend_timeout_ms: 300_000,
            idle_poll_ms: 1_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

impl WorkerConfig {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub watch_root: PathBuf,
    pub extensions: Vec<String>,
    pub poll_interval_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::from("~/.gantry/jobs"),
            extensions: vec!["yaml".to_string(), "yml".to_string()],
            poll_interval_ms: 1_000,
        }
    }
}

impl IngestionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub database: PathBuf,
    pub workflows: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("~/.gantry/gantry.db"),
            workflows: PathBuf::from("~/.gantry/workflows.yaml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Directory that relative workflow template paths resolve against
    pub template_root: Option<PathBuf>,
    pub history_poll_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8188".to_string(),
            template_root: None,
            history_poll_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_lease_must_outlive_backend_timeout() {
        let mut config = EngineConfig::default();
        config.worker.lease_duration_ms = config.worker.backend_timeout_ms;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lease_duration_ms"));
    }

    #[test]
    fn test_default_priority_must_be_in_range() {
        let mut config = EngineConfig::default();
        config.queue.default_priority = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: EngineConfig = serde_json::from_value(serde_json::json!({
            "queue": {"default_priority": 10},
            "worker": {"worker_id": "gpu-0"}
        }))
        .unwrap();
        assert_eq!(config.queue.default_priority, 10);
        assert_eq!(config.queue.max_priority, 999);
        assert_eq!(config.worker.worker_id.as_deref(), Some("gpu-0"));
        assert_eq!(config.worker.idle_poll_ms, 1_000);
        assert_eq!(config.known_kinds.len(), 5);
    }
}
