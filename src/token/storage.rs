//! Credential Storage
//!
//! Persistence port for the cached credential and its implementations.
//! A store holds at most one entry; `token` and `expiresAt` are always read,
//! written and cleared together.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::error::{CredentialError, StorageError};
use crate::types::CacheEntry;

/// Credential storage interface.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the persisted entry, if any.
    async fn read(&self) -> Result<Option<CacheEntry>, CredentialError>;

    /// Persist an entry, replacing any previous one.
    async fn write(&self, entry: CacheEntry) -> Result<(), CredentialError>;

    /// Remove the persisted entry. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), CredentialError>;
}

/// In-memory credential storage.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    entry: Mutex<Option<CacheEntry>>,
}

impl InMemoryCredentialStore {
    /// Create new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create in-memory storage holding `entry`.
    pub fn with_entry(entry: CacheEntry) -> Self {
        Self {
            entry: Mutex::new(Some(entry)),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn read(&self) -> Result<Option<CacheEntry>, CredentialError> {
        Ok(self.entry.lock().clone())
    }

    async fn write(&self, entry: CacheEntry) -> Result<(), CredentialError> {
        *self.entry.lock() = Some(entry);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        *self.entry.lock() = None;
        Ok(())
    }
}

/// Storage that persists nothing. Every lookup misses, so each request
/// needing a credential goes to the refresh client.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCredentialStore;

#[async_trait]
impl CredentialStore for NullCredentialStore {
    async fn read(&self) -> Result<Option<CacheEntry>, CredentialError> {
        Ok(None)
    }

    async fn write(&self, _entry: CacheEntry) -> Result<(), CredentialError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// JSON file credential storage, durable across process restarts.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a reader sees either the old entry or the new one.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store the entry for `key` as `<dir>/<key>.json`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    /// Store the entry at an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn read(&self) -> Result<Option<CacheEntry>, CredentialError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    message: format!("{}: {}", self.path.display(), e),
                }
                .into())
            }
        };

        let entry = serde_json::from_str(&content).map_err(|e| StorageError::CorruptedData {
            message: format!("{}: {}", self.path.display(), e),
        })?;

        Ok(Some(entry))
    }

    async fn write(&self, entry: CacheEntry) -> Result<(), CredentialError> {
        let content = serde_json::to_vec(&entry).map_err(|e| StorageError::WriteFailed {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    message: format!("{}: {}", parent.display(), e),
                })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: format!("{}: {}", temp.display(), e),
            })?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: format!("{}: {}", self.path.display(), e),
            })?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                message: format!("{}: {}", self.path.display(), e),
            }
            .into()),
        }
    }
}

/// Operation recorded by [`MockCredentialStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Read,
    Write,
    Clear,
}

/// Mock credential storage for testing.
#[derive(Default)]
pub struct MockCredentialStore {
    entry: Mutex<Option<CacheEntry>>,
    history: Mutex<Vec<StoreOp>>,
    write_history: Mutex<Vec<CacheEntry>>,
    fail_reads: Mutex<bool>,
    fail_writes: Mutex<bool>,
    fail_clears: Mutex<bool>,
    latency: Mutex<Option<std::time::Duration>>,
}

impl MockCredentialStore {
    /// Create new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the entry.
    pub fn set_entry(&self, entry: CacheEntry) -> &Self {
        *self.entry.lock() = Some(entry);
        self
    }

    /// Current entry, bypassing history and failure injection.
    pub fn entry(&self) -> Option<CacheEntry> {
        self.entry.lock().clone()
    }

    /// Make every read fail.
    pub fn set_fail_reads(&self, fail: bool) -> &Self {
        *self.fail_reads.lock() = fail;
        self
    }

    /// Make every write fail.
    pub fn set_fail_writes(&self, fail: bool) -> &Self {
        *self.fail_writes.lock() = fail;
        self
    }

    /// Make every clear fail.
    pub fn set_fail_clears(&self, fail: bool) -> &Self {
        *self.fail_clears.lock() = fail;
        self
    }

    /// Simulated latency applied before every operation takes effect.
    pub fn set_latency(&self, latency: std::time::Duration) -> &Self {
        *self.latency.lock() = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Get operation history.
    pub fn get_history(&self) -> Vec<StoreOp> {
        self.history.lock().clone()
    }

    /// Get written entries.
    pub fn get_write_history(&self) -> Vec<CacheEntry> {
        self.write_history.lock().clone()
    }

    /// Number of recorded operations of `op`.
    pub fn count(&self, op: StoreOp) -> usize {
        self.history.lock().iter().filter(|o| **o == op).count()
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn read(&self) -> Result<Option<CacheEntry>, CredentialError> {
        self.history.lock().push(StoreOp::Read);
        self.simulate_latency().await;
        if *self.fail_reads.lock() {
            return Err(StorageError::ReadFailed {
                message: "Mock storage failure".to_string(),
            }
            .into());
        }
        Ok(self.entry.lock().clone())
    }

    async fn write(&self, entry: CacheEntry) -> Result<(), CredentialError> {
        self.history.lock().push(StoreOp::Write);
        self.simulate_latency().await;
        if *self.fail_writes.lock() {
            return Err(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }
            .into());
        }
        self.write_history.lock().push(entry.clone());
        *self.entry.lock() = Some(entry);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        self.history.lock().push(StoreOp::Clear);
        self.simulate_latency().await;
        if *self.fail_clears.lock() {
            return Err(StorageError::DeleteFailed {
                message: "Mock storage failure".to_string(),
            }
            .into());
        }
        *self.entry.lock() = None;
        Ok(())
    }
}
