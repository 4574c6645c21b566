//! Transit data providers.
//!
//! [`DepartureProvider`] is the boundary to the transit API. [`EfaClient`]
//! talks to the MVV EFA endpoints; [`MockProvider`] serves canned data.

mod client;
mod convert;
mod error;
mod mock;
mod types;

use async_trait::async_trait;

use crate::domain::{Coordinate, DepartureEvent, StationLocation};

pub use client::{DEFAULT_BASE_URL, EfaClient, EfaConfig};
pub use convert::{ConversionError, convert_departures, convert_nearby, convert_stop_finder};
pub use error::FetchError;
pub use mock::MockProvider;
pub use types::{DepartureResponse, StopEvent, StopFinderResponse};

/// Source of departures and stations.
#[async_trait]
pub trait DepartureProvider: Send + Sync {
    /// Upcoming departures at a station, in provider order.
    async fn fetch_departures(&self, station_id: &str) -> Result<Vec<DepartureEvent>, FetchError>;

    /// Stops near a coordinate.
    async fn fetch_nearby(&self, coordinate: Coordinate)
    -> Result<Vec<StationLocation>, FetchError>;

    /// Stops matching a free-text query.
    async fn search_stations(&self, query: &str) -> Result<Vec<StationLocation>, FetchError>;
}
