//! Credential storage
//!
//! The client reads and writes its credentials through the
//! [`CredentialStore`] trait, a synchronous string key/value interface.
//! Three implementations are provided:
//!
//! - [`MemoryStore`]   -- process-local map, used in tests and one-shot runs
//! - [`FileStore`]     -- JSON file in the user's data directory
//! - [`KeyringStore`]  -- OS native credential store via `keyring`
//!
//! Every implementation is internally synchronized: a write is visible to
//! any read issued after the write returns.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use anyhow::Context;
use directories::ProjectDirs;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{ApiError, ApiResult, DinedashError, Result};

/// Store key holding the bearer access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Store key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Store key holding the role decoded from the access token.
pub const ROLE_KEY: &str = "role";

/// Synchronous key/value storage for session credentials.
pub trait CredentialStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> ApiResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> ApiResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> ApiResult<()>;
}

/// Opens the credential store selected by `config`.
///
/// # Errors
///
/// Returns [`DinedashError::Storage`] if the file store cannot be opened or
/// its default location cannot be determined.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => {
            let path = match &config.path {
                Some(path) => path.clone(),
                None => FileStore::default_path()?,
            };
            tracing::debug!("Using credential file {}", path.display());
            Arc::new(FileStore::open(path)?)
        }
        StoreBackend::Keyring => Arc::new(KeyringStore::new(KeyringStore::DEFAULT_SERVICE)),
    };
    Ok(store)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory credential store.
///
/// # Examples
///
/// ```
/// use dinedash::auth::store::{CredentialStore, MemoryStore, ACCESS_TOKEN_KEY};
///
/// let store = MemoryStore::new();
/// store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
/// assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("abc"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> ApiResult<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ApiResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// Credential store persisted as a flat JSON object on disk.
///
/// The whole file is rewritten on every change via a temporary file and an
/// atomic rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing contents if the file
    /// exists. The file and its parent directory are created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object of strings.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credential file {}", path.display()))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    DinedashError::Storage(format!(
                        "Credential file {} is corrupt: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the default credential file location in the platform data
    /// directory.
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "dinedash", "dinedash")
            .ok_or_else(|| DinedashError::Storage("Could not determine data directory".into()))?;
        Ok(proj_dirs.data_dir().join("credentials.json"))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> ApiResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ApiError::Store(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| ApiError::Store(format!("failed to serialize credentials: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| ApiError::Store(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            ApiError::Store(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> ApiResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    // Writes go to disk first; the in-memory map only changes once the file
    // has been replaced.
    fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> ApiResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// KeyringStore
// ---------------------------------------------------------------------------

/// Credential store backed by the OS keyring.
///
/// Each key is a separate keyring entry under one service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Service name used when none is configured.
    pub const DEFAULT_SERVICE: &'static str = "dinedash-session";

    /// Creates a store that namespaces its entries under `service`.
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> ApiResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| ApiError::Store(format!("keyring entry {key}: {e}")))
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> ApiResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ApiError::Store(format!("keyring read {key}: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| ApiError::Store(format!("keyring write {key}: {e}")))
    }

    fn remove(&self, key: &str) -> ApiResult<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ApiError::Store(format!("keyring delete {key}: {e}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
