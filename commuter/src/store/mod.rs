//! The persisted, observable favorites collection.
//!
//! One [`FavoriteStore`] per process. Mutations are serialized by a single
//! writer lock; each one persists the full snapshot, publishes a new
//! immutable [`StoreSnapshot`] to observers, and (for local edits only)
//! queues a [`FavoriteChange`] for the sync bridge.

mod error;
mod persistence;

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::domain::{Favorite, FavoriteFilterSet, FavoriteId, IdNormalizer, StationLocation};

pub use error::{PersistError, StoreError};
pub use persistence::{
    DEFAULT_DATA_FILE, JsonFilePersistence, MemoryPersistence, SnapshotPersistence,
};

/// Whether a favorite was added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Add,
    Remove,
}

/// A single add or remove, as queued for the sync bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteChange {
    pub favorite: Favorite,
    pub op: ChangeOp,
}

impl FavoriteChange {
    pub fn add(favorite: Favorite) -> Self {
        Self {
            favorite,
            op: ChangeOp::Add,
        }
    }

    pub fn remove(favorite: Favorite) -> Self {
        Self {
            favorite,
            op: ChangeOp::Remove,
        }
    }
}

/// An immutable view of the store, as published to observers.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub favorites: Arc<[Favorite]>,
    /// The most recent save failure, cleared by the next successful save.
    pub persist_error: Option<PersistError>,
}

/// Result of [`FavoriteStore::toggle`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Added(Favorite),
    Removed(Favorite),
}

impl ToggleOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }

    pub fn favorite(&self) -> &Favorite {
        match self {
            Self::Added(f) | Self::Removed(f) => f,
        }
    }
}

/// The favorites store.
///
/// Ids passed to [`contains`](Self::contains), [`list`](Self::list) and
/// [`remove_all`](Self::remove_all) must already be normalized (as returned
/// by [`StationLocation::normalized_id`]); the store never re-normalizes
/// them.
pub struct FavoriteStore {
    writer: Mutex<Vec<Favorite>>,
    persistence: Box<dyn SnapshotPersistence>,
    normalizer: IdNormalizer,
    snapshot_tx: watch::Sender<StoreSnapshot>,
    changes_tx: mpsc::UnboundedSender<FavoriteChange>,
}

impl FavoriteStore {
    /// Open the store, loading the last saved snapshot.
    ///
    /// Loaded favorites are re-keyed with `normalizer`. A failed load starts
    /// empty and surfaces the error in the first snapshot.
    ///
    /// Returns the store and the receiving end of its local change queue.
    pub fn open<P>(
        persistence: P,
        normalizer: IdNormalizer,
    ) -> (Self, mpsc::UnboundedReceiver<FavoriteChange>)
    where
        P: SnapshotPersistence + 'static,
    {
        let (favorites, persist_error) = match persistence.load() {
            Ok(loaded) => (
                loaded.iter().map(|f| f.renormalized(&normalizer)).collect(),
                None,
            ),
            Err(e) => {
                warn!(error = %e, "failed to load favorites, starting empty");
                (Vec::new(), Some(e))
            }
        };
        debug!(count = favorites.len(), rule = %normalizer.rule(), "opened favorite store");

        let (snapshot_tx, _) = watch::channel(StoreSnapshot {
            favorites: favorites.clone().into(),
            persist_error,
        });
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();

        let store = Self {
            writer: Mutex::new(favorites),
            persistence: Box::new(persistence),
            normalizer,
            snapshot_tx,
            changes_tx,
        };
        (store, changes_rx)
    }

    pub fn normalizer(&self) -> &IdNormalizer {
        &self.normalizer
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Observe every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// All favorites in insertion order.
    pub fn all(&self) -> Arc<[Favorite]> {
        self.snapshot_tx.borrow().favorites.clone()
    }

    pub fn get(&self, id: FavoriteId) -> Option<Favorite> {
        self.snapshot_tx
            .borrow()
            .favorites
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    /// Whether the logical favorite `(normalized_id, filters)` exists.
    pub fn contains(&self, normalized_id: &str, filters: &FavoriteFilterSet) -> bool {
        self.snapshot_tx
            .borrow()
            .favorites
            .iter()
            .any(|f| f.matches_identity(normalized_id, filters))
    }

    /// Every favorite for a station, whatever its filters.
    pub fn list(&self, normalized_id: &str) -> Vec<Favorite> {
        self.snapshot_tx
            .borrow()
            .favorites
            .iter()
            .filter(|f| f.normalized_id() == normalized_id)
            .cloned()
            .collect()
    }

    /// Add a favorite, or return the existing one with the same identity.
    ///
    /// An existing identity is not written again.
    pub fn add(
        &self,
        location: StationLocation,
        filters: FavoriteFilterSet,
    ) -> Result<Favorite, StoreError> {
        let mut favorites = self.lock();
        if let Some(existing) = find_identity(&favorites, location.normalized_id(), &filters) {
            return Ok(existing.clone());
        }

        let favorite = Favorite::create(location, filters);
        favorites.push(favorite.clone());
        debug!(id = %favorite.id(), station = favorite.normalized_id(), "added favorite");
        self.commit(&favorites, vec![FavoriteChange::add(favorite.clone())])?;
        Ok(favorite)
    }

    /// Remove a favorite by id. Absent ids are a no-op.
    pub fn remove(&self, id: FavoriteId) -> Result<Option<Favorite>, StoreError> {
        let mut favorites = self.lock();
        let Some(index) = favorites.iter().position(|f| f.id() == id) else {
            return Ok(None);
        };

        let removed = favorites.remove(index);
        debug!(%id, "removed favorite");
        self.commit(&favorites, vec![FavoriteChange::remove(removed.clone())])?;
        Ok(Some(removed))
    }

    /// Remove every favorite for a station.
    pub fn remove_all(&self, normalized_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let mut favorites = self.lock();
        let (removed, kept): (Vec<_>, Vec<_>) = favorites
            .drain(..)
            .partition(|f| f.normalized_id() == normalized_id);
        *favorites = kept;

        if removed.is_empty() {
            return Ok(removed);
        }

        debug!(station = normalized_id, count = removed.len(), "removed station favorites");
        let changes = removed.iter().cloned().map(FavoriteChange::remove).collect();
        self.commit(&favorites, changes)?;
        Ok(removed)
    }

    /// Remove the favorite with this identity if present, otherwise add it.
    pub fn toggle(
        &self,
        location: StationLocation,
        filters: FavoriteFilterSet,
    ) -> Result<ToggleOutcome, StoreError> {
        let mut favorites = self.lock();
        let existing = favorites
            .iter()
            .position(|f| f.matches_identity(location.normalized_id(), &filters));

        let (outcome, change) = match existing {
            Some(index) => {
                let removed = favorites.remove(index);
                (
                    ToggleOutcome::Removed(removed.clone()),
                    FavoriteChange::remove(removed),
                )
            }
            None => {
                let added = Favorite::create(location, filters);
                favorites.push(added.clone());
                (
                    ToggleOutcome::Added(added.clone()),
                    FavoriteChange::add(added),
                )
            }
        };

        debug!(
            id = %outcome.favorite().id(),
            added = outcome.is_added(),
            "toggled favorite"
        );
        self.commit(&favorites, vec![change])?;
        Ok(outcome)
    }

    /// Apply a change received from the peer.
    ///
    /// Idempotent: adding an id or identity that already exists, or removing
    /// one that doesn't, changes nothing. Removal matches by id first, then
    /// by identity. Never queued back to the peer.
    ///
    /// Returns whether the store changed.
    pub fn apply_remote(&self, change: FavoriteChange) -> Result<bool, StoreError> {
        let favorite = change.favorite.renormalized(&self.normalizer);
        let mut favorites = self.lock();

        match change.op {
            ChangeOp::Add => {
                let duplicate = favorites.iter().any(|f| {
                    f.id() == favorite.id()
                        || f.matches_identity(favorite.normalized_id(), favorite.filters())
                });
                if duplicate {
                    return Ok(false);
                }
                favorites.push(favorite);
            }
            ChangeOp::Remove => {
                let index = favorites
                    .iter()
                    .position(|f| f.id() == favorite.id())
                    .or_else(|| {
                        favorites.iter().position(|f| {
                            f.matches_identity(favorite.normalized_id(), favorite.filters())
                        })
                    });
                let Some(index) = index else {
                    return Ok(false);
                };
                favorites.remove(index);
            }
        }

        debug!(op = ?change.op, id = %change.favorite.id(), "applied remote change");
        self.commit(&favorites, Vec::new())?;
        Ok(true)
    }

    /// Replace the whole collection with a merged list from sync.
    ///
    /// Favorites are re-keyed with this store's normalizer. Never queued
    /// back to the peer.
    pub fn replace_all(&self, incoming: Vec<Favorite>) -> Result<(), StoreError> {
        let mut favorites = self.lock();
        *favorites = incoming
            .iter()
            .map(|f| f.renormalized(&self.normalizer))
            .collect();
        debug!(count = favorites.len(), "replaced favorites");
        self.commit(&favorites, Vec::new())?;
        Ok(())
    }

    /// Replace the collection with `merge(current)` under one writer lock.
    ///
    /// No local mutation can land between reading the current list and
    /// storing the result. The result is re-keyed with this store's
    /// normalizer and never queued back to the peer.
    ///
    /// Returns the new count, or `None` without writing when the result
    /// equals the current list. On a save failure the result is kept.
    pub fn replace_with<F>(&self, merge: F) -> Result<Option<usize>, StoreError>
    where
        F: FnOnce(&[Favorite]) -> Vec<Favorite>,
    {
        let mut favorites = self.lock();
        let merged: Vec<Favorite> = merge(&favorites)
            .iter()
            .map(|f| f.renormalized(&self.normalizer))
            .collect();
        if merged == *favorites {
            return Ok(None);
        }

        *favorites = merged;
        let count = favorites.len();
        debug!(count, "replaced favorites");
        self.commit(&favorites, Vec::new())?;
        Ok(Some(count))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Favorite>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist, publish, then queue deltas.
    ///
    /// Called with the writer lock held. The snapshot is published whether
    /// or not the save succeeds.
    fn commit(
        &self,
        favorites: &[Favorite],
        changes: Vec<FavoriteChange>,
    ) -> Result<(), PersistError> {
        let saved = self.persistence.save(favorites);
        if let Err(e) = &saved {
            warn!(error = %e, "failed to persist favorites");
        }

        self.snapshot_tx.send_replace(StoreSnapshot {
            favorites: favorites.into(),
            persist_error: saved.clone().err(),
        });

        for change in changes {
            if self.changes_tx.send(change).is_err() {
                debug!("sync change queue closed, dropping change");
                break;
            }
        }

        saved
    }
}

fn find_identity<'a>(
    favorites: &'a [Favorite],
    normalized_id: &str,
    filters: &FavoriteFilterSet,
) -> Option<&'a Favorite> {
    favorites
        .iter()
        .find(|f| f.matches_identity(normalized_id, filters))
}
