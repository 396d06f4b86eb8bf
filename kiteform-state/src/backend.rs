//! State backend trait and error types

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Another run holds an unexpired lock
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation}, expires: {expires})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
        expires: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
            expires: lock.expires.to_rfc3339(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state; `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Persist the state, replacing what was stored before
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock for `operation`
    ///
    /// Fails with `BackendError::Locked` while another unexpired lock exists.
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a lock previously returned by `acquire_lock`
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove a stale lock by id, regardless of who holds it
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// The `[backend]` table of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    /// State file location for the local backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_backend_type() -> String {
    "local".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_locked() {
        let lock = LockInfo::new("apply");
        let error = BackendError::locked(&lock);

        match error {
            BackendError::Locked {
                lock_id,
                who,
                operation,
                expires,
            } => {
                assert_eq!(lock_id, lock.id);
                assert_eq!(who, lock.who);
                assert_eq!(operation, "apply");
                assert_eq!(expires, lock.expires.to_rfc3339());
            }
            _ => panic!("Expected Locked error"),
        }
    }

    #[test]
    fn test_backend_config_from_toml() {
        let config: BackendConfig = toml::from_str(
            r#"
            type = "local"
            path = "state/pipelines.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.path, Some(PathBuf::from("state/pipelines.json")));

        let config: BackendConfig = toml::from_str("").unwrap();
        assert_eq!(config, BackendConfig::default());
    }

    #[test]
    fn test_backend_config_rejects_unknown_keys() {
        let result = toml::from_str::<BackendConfig>(r#"bucket = "my-bucket""#);
        assert!(result.is_err());
    }
}
