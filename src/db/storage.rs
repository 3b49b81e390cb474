use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AuthToken,
    Favorites,
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKey::AuthToken => write!(f, "musicreco:token"),
            StorageKey::Favorites => write!(f, "musicreco:favorites"),
        }
    }
}

/// Synchronous key/value storage persisted between sessions
pub trait Storage: Send + Sync {
    fn get_raw(&self, key: &StorageKey) -> AppResult<Option<String>>;

    fn set_raw(&self, key: &StorageKey, value: String) -> AppResult<()>;

    fn remove(&self, key: &StorageKey) -> AppResult<()>;
}

/// Typed access on top of any [`Storage`]
pub trait StorageExt: Storage {
    /// Retrieves and deserializes a value
    ///
    /// A value that exists but fails to parse is reported as an error so the
    /// caller can decide whether to discard it.
    fn get<T: DeserializeOwned>(&self, key: &StorageKey) -> AppResult<Option<T>> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a value
    fn set<T: Serialize>(&self, key: &StorageKey, value: &T) -> AppResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, json)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

/// Storage backed by a single JSON object on disk
///
/// Every write rewrites the file, so state on disk always matches memory.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Opens the storage file, treating a missing or corrupt file as empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);

        tracing::debug!(path = %path.display(), entries = entries.len(), "Opened local storage");

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &Path) -> HashMap<String, String> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read local storage, starting empty");
                return HashMap::new();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %path.display(), "Corrupt local storage, starting empty");
            HashMap::new()
        })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::Internal("local storage lock poisoned".to_string()))
    }
}

impl Storage for FileStorage {
    fn get_raw(&self, key: &StorageKey) -> AppResult<Option<String>> {
        Ok(self.lock()?.get(&key.to_string()).cloned())
    }

    fn set_raw(&self, key: &StorageKey, value: String) -> AppResult<()> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &StorageKey) -> AppResult<()> {
        let mut entries = self.lock()?;
        if entries.remove(&key.to_string()).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// In-process storage, lost on exit
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_raw(&self, key: &StorageKey) -> AppResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("memory storage lock poisoned".to_string()))?;
        Ok(entries.get(&key.to_string()).cloned())
    }

    fn set_raw(&self, key: &StorageKey, value: String) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("memory storage lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &StorageKey) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::Internal("memory storage lock poisoned".to_string()))?;
        entries.remove(&key.to_string());
        Ok(())
    }
}
