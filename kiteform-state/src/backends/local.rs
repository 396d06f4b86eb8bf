//! Local file backend
//!
//! State lives in a JSON file (default: kiteform.state.json) next to a
//! `.lock` file. The lock file is created exclusively, so two runs racing for
//! it cannot both win. A lock file that cannot be parsed is never taken
//! over; `force_unlock` clears it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "kiteform.state.json";

    pub fn with_path(state_path: PathBuf) -> Self {
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        match &config.path {
            Some(path) if path.as_os_str().is_empty() => Err(BackendError::configuration(
                "local backend path must not be empty",
            )),
            Some(path) => Ok(Self::with_path(path.clone())),
            None => Ok(Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Io(format!("Failed to read lock file: {}", e))),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BackendError::InvalidState(format!("Failed to parse lock file: {}", e)))
    }

    /// Remove an expired lock, provided the file still holds that same lock
    async fn take_over_expired(&self, expired: &LockInfo) -> BackendResult<()> {
        match self.read_lock().await? {
            None => Ok(()),
            Some(current) if current.id == expired.id => {
                warn!(
                    "state: taking over expired lock {} held by {}",
                    expired.id, expired.who
                );
                match fs::remove_file(&self.lock_path).await {
                    Err(e) if e.kind() != ErrorKind::NotFound => Err(BackendError::Io(format!(
                        "Failed to remove lock file: {}",
                        e
                    ))),
                    _ => Ok(()),
                }
            }
            Some(current) => Err(BackendError::locked(&current)),
        }
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Io(format!("Failed to read state file: {}", e))),
        };

        let state = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        // Write beside the target, then rename over it
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;
        fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to replace state file: {}", e)))?;

        debug!(
            "state: wrote serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        match self.read_lock().await {
            Ok(None) => {}
            Ok(Some(existing)) if !existing.is_expired() => {
                return Err(BackendError::locked(&existing));
            }
            Ok(Some(existing)) => self.take_over_expired(&existing).await?,
            // Empty or half-written: another run may be creating it right now
            Err(BackendError::InvalidState(e)) => {
                return Err(BackendError::InvalidState(format!(
                    "{} ({}); clear it with `kiteform state force-unlock` if no run holds it",
                    e,
                    self.lock_path.display()
                )));
            }
            Err(e) => return Err(e),
        }

        let lock = LockInfo::new(operation);
        let content = serde_json::to_vec_pretty(&lock)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Lost the race to another run
                return match self.read_lock().await {
                    Ok(Some(winner)) => Err(BackendError::locked(&winner)),
                    Ok(None) => Err(BackendError::Io("Lock file vanished while locking".to_string())),
                    Err(BackendError::InvalidState(_)) => Err(BackendError::InvalidState(
                        "Lock file is being written by another run".to_string(),
                    )),
                    Err(e) => Err(e),
                };
            }
            Err(e) => return Err(BackendError::Io(format!("Failed to create lock file: {}", e))),
        };
        file.write_all(&content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write lock file: {}", e)))?;

        debug!("state: acquired lock {} for {}", lock.id, operation);
        Ok(lock)
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;

        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }

        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        if !fs::try_exists(&self.lock_path).await.unwrap_or(false) {
            return Err(BackendError::LockNotFound(lock_id.to_string()));
        }

        // A corrupt lock file can always be forced
        if let Ok(Some(existing)) = self.read_lock().await
            && existing.id != lock_id
        {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }

        self.remove_lock().await
    }
}
