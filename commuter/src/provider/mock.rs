//! In-memory provider for tests and offline development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Coordinate, DepartureEvent, StationLocation};
use crate::ordering::sort_locations_by_distance;

use super::DepartureProvider;
use super::error::FetchError;

#[derive(Debug, Default)]
struct MockInner {
    boards: HashMap<String, Vec<DepartureEvent>>,
    stations: Vec<StationLocation>,
    fetches: HashMap<String, usize>,
    fail_next_fetch: Option<String>,
    delay: Option<Duration>,
}

/// Provider serving canned boards and stations.
///
/// Counts departure fetches per station and can inject failures and
/// latency. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<MockInner>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `events` for `station_id`.
    pub fn with_board(self, station_id: impl Into<String>, events: Vec<DepartureEvent>) -> Self {
        self.lock().boards.insert(station_id.into(), events);
        self
    }

    /// Make `location` findable by search and proximity.
    pub fn with_station(self, location: StationLocation) -> Self {
        self.lock().stations.push(location);
        self
    }

    /// Replace the board for `station_id`.
    pub fn set_board(&self, station_id: impl Into<String>, events: Vec<DepartureEvent>) {
        self.lock().boards.insert(station_id.into(), events);
    }

    /// Delay every departure fetch.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Cause the next departure fetch to fail.
    pub fn fail_next_fetch(&self, message: &str) {
        self.lock().fail_next_fetch = Some(message.to_string());
    }

    /// Departure fetches for `station_id` so far.
    pub fn fetch_count(&self, station_id: &str) -> usize {
        self.lock().fetches.get(station_id).copied().unwrap_or(0)
    }

    /// Departure fetches across all stations.
    pub fn total_fetches(&self) -> usize {
        self.lock().fetches.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DepartureProvider for MockProvider {
    async fn fetch_departures(&self, station_id: &str) -> Result<Vec<DepartureEvent>, FetchError> {
        let (delay, failure) = {
            let mut inner = self.lock();
            *inner.fetches.entry(station_id.to_string()).or_default() += 1;
            (inner.delay, inner.fail_next_fetch.take())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            return Err(FetchError::Api {
                status: 503,
                message,
            });
        }

        Ok(self.lock().boards.get(station_id).cloned().unwrap_or_default())
    }

    async fn fetch_nearby(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<StationLocation>, FetchError> {
        let mut stations: Vec<StationLocation> = self
            .lock()
            .stations
            .iter()
            .filter(|s| s.distance_from(&coordinate).is_some())
            .cloned()
            .collect();
        sort_locations_by_distance(&mut stations, Some(&coordinate));
        Ok(stations)
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<StationLocation>, FetchError> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .lock()
            .stations
            .iter()
            .filter(|s| {
                s.display_name().to_lowercase().contains(&query)
                    || s.name().is_some_and(|n| n.to_lowercase().contains(&query))
            })
            .cloned()
            .collect())
    }
}
