//! Short departure previews for favorites.
//!
//! Each favorite shows its next few matching departures. Previews are served
//! stale-while-revalidate: a stale or missing entry is returned immediately
//! and refreshed in the background. At most one fetch per key is in flight.
//!
//! Entries never expire from the cache on their own; freshness is judged
//! against `fetched_at` so a stale preview is still available while its
//! refresh runs.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use moka::future::Cache as MokaCache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::{DepartureEvent, Favorite, FavoriteFilterSet, StationLocation};
use crate::filter::filter_departures;
use crate::ordering::sort_by_time;
use crate::provider::{DepartureProvider, FetchError};

/// Departures kept per preview.
pub const DEFAULT_PREVIEW_ITEMS: usize = 3;

/// Configuration for the preview cache.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Age after which an entry is refreshed on access.
    pub ttl: Duration,

    /// Departures kept per entry.
    pub max_items: usize,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl PreviewConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_items(mut self, n: usize) -> Self {
        self.max_items = n;
        self
    }

    pub fn with_max_capacity(mut self, n: u64) -> Self {
        self.max_capacity = n;
        self
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_items: DEFAULT_PREVIEW_ITEMS,
            max_capacity: 500,
        }
    }
}

/// Cache key: a station and the filters applied to its board.
///
/// Equality and hashing use the normalized station id and the filters only.
/// `station_id` is the raw id the provider is asked for.
#[derive(Debug, Clone)]
pub struct PreviewKey {
    pub normalized_id: String,
    pub filters: FavoriteFilterSet,
    pub station_id: String,
}

impl PreviewKey {
    /// The unfiltered board of a station.
    pub fn station(location: &StationLocation) -> Self {
        Self {
            normalized_id: location.normalized_id().to_string(),
            filters: FavoriteFilterSet::none(),
            station_id: location.id().to_string(),
        }
    }

    /// A favorite's station, narrowed by its filters.
    pub fn for_favorite(favorite: &Favorite) -> Self {
        Self {
            normalized_id: favorite.normalized_id().to_string(),
            filters: favorite.filters().clone(),
            station_id: favorite.location().id().to_string(),
        }
    }
}

impl PartialEq for PreviewKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_id == other.normalized_id && self.filters == other.filters
    }
}

impl Eq for PreviewKey {}

impl Hash for PreviewKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_id.hash(state);
        self.filters.hash(state);
    }
}

#[derive(Debug)]
struct PreviewEntry {
    events: Arc<[DepartureEvent]>,
    fetched_at: Instant,
}

/// What a caller sees for a key right now.
#[derive(Debug, Clone, Default)]
pub struct PreviewSnapshot {
    pub events: Arc<[DepartureEvent]>,
    /// A refresh is running; `events` may be stale or empty.
    pub is_loading: bool,
}

/// Result of [`DeparturePreviewCache::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched and stored this many departures.
    Refreshed(usize),
    /// Another refresh for the key was already running; nothing fetched.
    AlreadyInFlight,
}

type InFlight = Arc<Mutex<HashSet<PreviewKey>>>;

/// Marks a key in flight until dropped.
struct InFlightGuard {
    in_flight: InFlight,
    key: PreviewKey,
}

impl InFlightGuard {
    fn acquire(in_flight: &InFlight, key: &PreviewKey) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| Self {
            in_flight: Arc::clone(in_flight),
            key: key.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Per-favorite departure previews over a [`DepartureProvider`].
///
/// Cheap to clone; clones share entries and in-flight markers.
#[derive(Clone)]
pub struct DeparturePreviewCache {
    entries: MokaCache<PreviewKey, Arc<PreviewEntry>>,
    in_flight: InFlight,
    provider: Arc<dyn DepartureProvider>,
    ttl: Duration,
    max_items: usize,
}

impl DeparturePreviewCache {
    pub fn new(provider: Arc<dyn DepartureProvider>, config: &PreviewConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .build();

        Self {
            entries,
            in_flight: Arc::default(),
            provider,
            ttl: config.ttl,
            max_items: config.max_items,
        }
    }

    /// The current preview for `key`.
    ///
    /// Fresh entries are returned as is. Otherwise a background refresh is
    /// started (unless one is running) and whatever is cached, possibly
    /// nothing, is returned with `is_loading` set.
    pub async fn get(&self, key: &PreviewKey) -> PreviewSnapshot {
        let cached = self.entries.get(key).await;

        if let Some(entry) = cached.as_ref().filter(|e| e.fetched_at.elapsed() < self.ttl) {
            return PreviewSnapshot {
                events: Arc::clone(&entry.events),
                is_loading: false,
            };
        }

        if !self.is_in_flight(key) {
            let cache = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.refresh(&key).await {
                    warn!(station = %key.normalized_id, error = %e, "preview refresh failed");
                }
            });
        }

        PreviewSnapshot {
            events: cached.map(|e| Arc::clone(&e.events)).unwrap_or_default(),
            is_loading: true,
        }
    }

    /// Fetch, filter, sort and store the preview for `key`.
    ///
    /// Returns [`RefreshOutcome::AlreadyInFlight`] without fetching if
    /// another refresh for the same key is running. On error the previous
    /// entry is left untouched.
    pub async fn refresh(&self, key: &PreviewKey) -> Result<RefreshOutcome, FetchError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, key) else {
            debug!(station = %key.normalized_id, "preview refresh already in flight");
            return Ok(RefreshOutcome::AlreadyInFlight);
        };

        let events = self.provider.fetch_departures(&key.station_id).await?;
        let mut events = if key.filters.is_active() {
            filter_departures(&events, &key.filters)
        } else {
            events
        };
        sort_by_time(&mut events);
        events.truncate(self.max_items);

        let count = events.len();
        let entry = PreviewEntry {
            events: events.into(),
            fetched_at: Instant::now(),
        };
        self.entries.insert(key.clone(), Arc::new(entry)).await;
        debug!(station = %key.normalized_id, count, "refreshed preview");

        Ok(RefreshOutcome::Refreshed(count))
    }

    /// Refresh the previews of the first `n` favorites concurrently.
    ///
    /// Returns how many were refreshed; failures are logged.
    pub async fn warm(&self, favorites: &[Favorite], n: usize) -> usize {
        let keys: Vec<PreviewKey> = favorites
            .iter()
            .take(n)
            .map(PreviewKey::for_favorite)
            .collect();
        let results = join_all(keys.iter().map(|key| self.refresh(key))).await;

        let mut refreshed = 0;
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(RefreshOutcome::Refreshed(_)) => refreshed += 1,
                Ok(RefreshOutcome::AlreadyInFlight) => {}
                Err(e) => warn!(station = %key.normalized_id, error = %e, "preview warm-up failed"),
            }
        }
        refreshed
    }

    /// Drop the entry for `key`.
    pub async fn invalidate(&self, key: &PreviewKey) {
        self.entries.invalidate(key).await;
    }

    pub fn is_in_flight(&self, key: &PreviewKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

impl std::fmt::Debug for DeparturePreviewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeparturePreviewCache")
            .field("ttl", &self.ttl)
            .field("max_items", &self.max_items)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdNormalizer;
    use crate::provider::MockProvider;

    const STATION: &str = "de:09162:10:1:1";

    fn pasing() -> StationLocation {
        StationLocation::new(STATION, &IdNormalizer::default()).with_preferred_name("Pasing")
    }

    fn departure(line: &str, dest: &str, minute: u32) -> DepartureEvent {
        DepartureEvent::new(line, dest).with_planned(format!("2024-03-15T09:{minute:02}:00Z"))
    }

    fn board() -> Vec<DepartureEvent> {
        vec![
            departure("S3", "Holzkirchen", 20),
            departure("S6", "Tutzing", 5),
            departure("S3", "Mammendorf", 12),
            departure("S4", "Geltendorf", 8),
            departure("S3", "Holzkirchen", 40),
        ]
    }

    fn cache(provider: &MockProvider) -> DeparturePreviewCache {
        DeparturePreviewCache::new(Arc::new(provider.clone()), &PreviewConfig::default())
    }

    /// Let spawned refreshes run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn key_ignores_raw_station_id() {
        let a = PreviewKey::station(&pasing());
        let b = PreviewKey::station(
            &StationLocation::new("de:09162:10:2:4", &IdNormalizer::default()),
        );
        assert_eq!(a, b);
        assert_ne!(a.station_id, b.station_id);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_sorts_and_truncates() {
        let provider = MockProvider::new().with_board(STATION, board());
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());

        assert_eq!(cache.refresh(&key).await.unwrap(), RefreshOutcome::Refreshed(3));

        let snapshot = cache.get(&key).await;
        assert!(!snapshot.is_loading);
        let lines: Vec<_> = snapshot.events.iter().map(|e| e.line_label.as_str()).collect();
        assert_eq!(lines, vec!["S6", "S4", "S3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn favorite_filters_apply() {
        let provider = MockProvider::new().with_board(STATION, board());
        let cache = cache(&provider);
        let favorite = Favorite::create(
            pasing(),
            FavoriteFilterSet::none().with_destinations(["holzkirchen"]),
        );
        let key = PreviewKey::for_favorite(&favorite);

        assert_eq!(cache.refresh(&key).await.unwrap(), RefreshOutcome::Refreshed(2));
        let snapshot = cache.get(&key).await;
        assert!(snapshot.events.iter().all(|e| e.final_destination_name == "Holzkirchen"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_fetch_once() {
        let provider = MockProvider::new().with_board(STATION, board());
        provider.set_delay(Duration::from_secs(1));
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());

        let (first, second) = tokio::join!(cache.refresh(&key), cache.refresh(&key));

        assert_eq!(first.unwrap(), RefreshOutcome::Refreshed(3));
        assert_eq!(second.unwrap(), RefreshOutcome::AlreadyInFlight);
        assert_eq!(provider.fetch_count(STATION), 1);
        assert!(!cache.is_in_flight(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn marker_released_after_error() {
        let provider = MockProvider::new().with_board(STATION, board());
        provider.fail_next_fetch("timeout");
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());

        assert!(cache.refresh(&key).await.is_err());
        assert!(!cache.is_in_flight(&key));
        assert_eq!(cache.refresh(&key).await.unwrap(), RefreshOutcome::Refreshed(3));
    }

    #[tokio::test(start_paused = true)]
    async fn marker_released_after_cancellation() {
        let provider = MockProvider::new().with_board(STATION, board());
        provider.set_delay(Duration::from_secs(30));
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());

        let task = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move { cache.refresh(&key).await })
        };
        settle().await;
        assert!(cache.is_in_flight(&key));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!cache.is_in_flight(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_entry_loads_in_background() {
        let provider = MockProvider::new().with_board(STATION, board());
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());

        let snapshot = cache.get(&key).await;
        assert!(snapshot.is_loading);
        assert!(snapshot.events.is_empty());

        settle().await;
        let snapshot = cache.get(&key).await;
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.events.len(), 3);
        assert_eq!(provider.fetch_count(STATION), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_served_while_refreshing() {
        let provider = MockProvider::new().with_board(STATION, board());
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());
        cache.refresh(&key).await.unwrap();

        provider.set_board(STATION, vec![departure("S8", "Flughafen", 1)]);
        tokio::time::advance(Duration::from_secs(6 * 60)).await;

        let stale = cache.get(&key).await;
        assert!(stale.is_loading);
        assert_eq!(stale.events.len(), 3);

        settle().await;
        let fresh = cache.get(&key).await;
        assert!(!fresh.is_loading);
        assert_eq!(fresh.events[0].line_label, "S8");
        assert_eq!(provider.fetch_count(STATION), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_entry() {
        let provider = MockProvider::new().with_board(STATION, board());
        let cache = cache(&provider);
        let key = PreviewKey::station(&pasing());
        cache.refresh(&key).await.unwrap();

        provider.fail_next_fetch("maintenance");
        assert!(cache.refresh(&key).await.is_err());
        assert_eq!(cache.get(&key).await.events.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn warm_refreshes_first_n() {
        let provider = MockProvider::new()
            .with_board(STATION, board())
            .with_board("de:09162:6", vec![departure("U1", "Olympia-Einkaufszentrum", 3)]);
        let cache = cache(&provider);
        let favorites = vec![
            Favorite::create(pasing(), FavoriteFilterSet::none()),
            Favorite::create(
                StationLocation::new("de:09162:6", &IdNormalizer::default()),
                FavoriteFilterSet::none(),
            ),
            Favorite::create(
                StationLocation::new("de:09162:1", &IdNormalizer::default()),
                FavoriteFilterSet::none(),
            ),
        ];

        assert_eq!(cache.warm(&favorites, 2).await, 2);
        assert_eq!(provider.fetch_count("de:09162:1"), 0);
        assert!(!cache.get(&PreviewKey::for_favorite(&favorites[1])).await.is_loading);
    }
}
