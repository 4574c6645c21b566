//! Snapshot persistence backends for the favorite store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PersistError;
use crate::domain::Favorite;

/// Default file name for the favorites snapshot.
pub const DEFAULT_DATA_FILE: &str = "favorites.json";

/// Loads and saves the full favorites list.
///
/// Saves always write the whole snapshot; there is no incremental format.
/// Both calls are synchronous and may block on I/O. The store calls `save`
/// while holding its writer lock, so async callers should mutate the store
/// from a blocking task.
pub trait SnapshotPersistence: Send + Sync {
    /// Load the last saved snapshot. A missing snapshot is an empty list.
    fn load(&self) -> Result<Vec<Favorite>, PersistError>;

    /// Replace the stored snapshot.
    fn save(&self, favorites: &[Favorite]) -> Result<(), PersistError>;
}

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
struct StoredFavorites {
    saved_at: DateTime<Utc>,
    favorites: Vec<Favorite>,
}

/// Pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl Default for JsonFilePersistence {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_FILE)
    }
}

impl SnapshotPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<Favorite>, PersistError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let stored: StoredFavorites =
            serde_json::from_str(&contents).map_err(|e| PersistError::Corrupt {
                message: e.to_string(),
            })?;
        Ok(stored.favorites)
    }

    /// Creates parent directories if they don't exist.
    fn save(&self, favorites: &[Favorite]) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let stored = StoredFavorites {
            saved_at: Utc::now(),
            favorites: favorites.to_vec(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|e| PersistError::Serialize {
            message: e.to_string(),
        })?;

        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    favorites: Vec<Favorite>,
    fail_saves: bool,
    save_count: usize,
}

/// In-memory persistence for tests and ephemeral stores.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously saved snapshot.
    pub fn with_favorites(favorites: Vec<Favorite>) -> Self {
        let persistence = Self::default();
        persistence.lock().favorites = favorites;
        persistence
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// The last successfully saved snapshot.
    pub fn saved(&self) -> Vec<Favorite> {
        self.lock().favorites.clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<Favorite>, PersistError> {
        Ok(self.lock().favorites.clone())
    }

    fn save(&self, favorites: &[Favorite]) -> Result<(), PersistError> {
        let mut inner = self.lock();
        if inner.fail_saves {
            return Err(PersistError::Unavailable {
                message: "saves disabled".to_string(),
            });
        }
        inner.favorites = favorites.to_vec();
        inner.save_count += 1;
        Ok(())
    }
}
