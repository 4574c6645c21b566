//! Domain types for the departure viewer.
//!
//! Stations, departures, transport types, filter sets and favorites. All
//! types enforce their invariants at construction time (normalized ids,
//! empty filter axes collapsed to absent), so code that receives them can
//! trust their validity.

mod departure;
mod favorite;
mod filters;
mod identity;
mod station;
mod time;
mod transport;

pub use departure::{DepartureEvent, MAX_PLATFORM_CANDIDATES};
pub use favorite::{Favorite, FavoriteId, FavoriteIdentity};
pub use filters::FavoriteFilterSet;
pub use identity::{IdNormalizer, InvalidNormalizationRule, NormalizationRule, STATION_COMPONENTS};
pub use station::{Coordinate, StationLocation, UNKNOWN_STATION};
pub use time::{InvalidTimestamp, parse_instant, parse_optional};
pub use transport::TransportType;

#[cfg(test)]
pub(crate) use favorite::test_support;
