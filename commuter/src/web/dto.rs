//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::display::DepartureDisplay;
use crate::domain::{
    Coordinate, DepartureEvent, Favorite, FavoriteFilterSet, IdNormalizer, StationLocation,
    TransportType,
};
use crate::ordering::format_distance;
use crate::sync::SyncState;

/// Station search by name.
#[derive(Debug, Deserialize)]
pub struct StationSearchRequest {
    pub q: String,
}

/// Stops around a coordinate.
#[derive(Debug, Deserialize)]
pub struct NearbyRequest {
    pub lat: f64,
    pub lon: f64,
}

/// A station in search or nearby results.
#[derive(Debug, Serialize)]
pub struct StationResult {
    /// Raw provider id
    pub id: String,

    /// Station key favorites are matched by
    pub normalized_id: String,

    pub name: String,

    /// Enclosing locality (e.g. "München")
    pub parent_name: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,

    /// Formatted distance from the query point, when known
    pub distance: Option<String>,
}

impl StationResult {
    pub fn from_location(location: &StationLocation, reference: Option<&Coordinate>) -> Self {
        let coordinate = location.coordinate();
        Self {
            id: location.id().to_string(),
            normalized_id: location.normalized_id().to_string(),
            name: location.display_name().to_string(),
            parent_name: location.parent_name().map(str::to_string),
            lat: coordinate.map(|c| c.lat),
            lon: coordinate.map(|c| c.lon),
            distance: reference
                .and_then(|r| location.distance_from(r))
                .map(format_distance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StationSearchResponse {
    pub stations: Vec<StationResult>,
}

/// Filter axes as comma-separated query parameters.
///
/// `transport_types` takes raw values (`S-Bahn`, `U-Bahn`) or anything
/// [`TransportType::classify`] understands.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub destinations: Option<String>,
    pub platforms: Option<String>,
    pub transport_types: Option<String>,
}

impl FilterQuery {
    /// Build the filter set. Returns the first unrecognised transport type
    /// on failure.
    pub fn to_filters(&self) -> Result<FavoriteFilterSet, String> {
        let mut filters = FavoriteFilterSet::none();

        if let Some(destinations) = &self.destinations {
            filters = filters.with_destinations(split_list(destinations));
        }
        if let Some(platforms) = &self.platforms {
            filters = filters.with_platforms(split_list(platforms));
        }
        if let Some(types) = &self.transport_types {
            let parsed = split_list(types)
                .map(|t| {
                    TransportType::from_raw_value(t)
                        .or_else(|| TransportType::classify(t))
                        .ok_or_else(|| t.to_string())
                })
                .collect::<Result<Vec<_>, _>>()?;
            filters = filters.with_transport_types(parsed);
        }

        Ok(filters)
    }
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// One row of a departure board.
#[derive(Debug, Serialize)]
pub struct DepartureRow {
    pub line: String,
    pub destination: String,
    pub mode: String,
    pub transport_type: Option<TransportType>,
    pub platform: Option<String>,

    /// "5 min", "Jetzt", "09:12" or "--:--"
    pub time: String,

    /// "+3" when late
    pub delay: Option<String>,

    pub is_urgent: bool,
    pub is_realtime: bool,
    pub planned_time: Option<String>,
    pub estimated_time: Option<String>,
}

impl DepartureRow {
    pub fn new(event: &DepartureEvent, display: DepartureDisplay) -> Self {
        Self {
            line: event.line_label.clone(),
            destination: event.final_destination_name.clone(),
            mode: event.mode_class_name.clone(),
            transport_type: event.transport_type(),
            platform: event.effective_platform().map(str::to_string),
            time: display.text,
            delay: display.delay_text,
            is_urgent: display.is_urgent,
            is_realtime: event.is_realtime,
            planned_time: event.planned_time.clone(),
            estimated_time: event.estimated_time.clone(),
        }
    }
}

/// A station's live board.
#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub station_id: String,
    pub normalized_id: String,

    /// Whether a favorite with exactly these filters exists
    pub favorite_active: bool,

    pub departures: Vec<DepartureRow>,

    /// Platforms present on the unfiltered board
    pub platforms: Vec<String>,

    /// Destinations present on the unfiltered board
    pub destinations: Vec<String>,
}

/// Favorites listing options.
#[derive(Debug, Default, Deserialize)]
pub struct FavoritesRequest {
    /// `alphabetical` (default) or `distance`
    pub sort: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl FavoritesRequest {
    pub fn reference(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Coordinate::new(lat, lon))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoriteResult {
    pub id: String,
    pub station_id: String,
    pub normalized_id: String,
    pub name: String,

    /// Name plus a compact filter description
    pub short_name: String,

    pub filters: FavoriteFilterSet,
    pub filter_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub distance: Option<String>,
}

impl FavoriteResult {
    pub fn from_favorite(favorite: &Favorite, reference: Option<&Coordinate>) -> Self {
        Self {
            id: favorite.id().to_string(),
            station_id: favorite.location().id().to_string(),
            normalized_id: favorite.normalized_id().to_string(),
            name: favorite.display_name().to_string(),
            short_name: favorite.short_display_name(),
            filters: favorite.filters().clone(),
            filter_summary: favorite.filters().summary(),
            created_at: favorite.created_at(),
            distance: reference
                .and_then(|r| favorite.location().distance_from(r))
                .map(format_distance),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<FavoriteResult>,

    /// Last persistence failure, if the most recent save did not succeed
    pub persist_error: Option<String>,
}

/// The station a favorite is toggled for.
#[derive(Debug, Deserialize)]
pub struct StationInput {
    pub id: String,
    pub name: Option<String>,
    pub preferred_name: Option<String>,
    pub parent_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl StationInput {
    pub fn to_location(&self, normalizer: &IdNormalizer) -> StationLocation {
        let mut location = StationLocation::new(self.id.trim(), normalizer);
        if let Some(name) = &self.name {
            location = location.with_name(name.as_str());
        }
        if let Some(name) = &self.preferred_name {
            location = location.with_preferred_name(name.as_str());
        }
        if let Some(name) = &self.parent_name {
            location = location.with_parent_name(name.as_str());
        }
        if let Some(coordinate) = self
            .lat
            .zip(self.lon)
            .and_then(|(lat, lon)| Coordinate::from_lat_lon_slice(&[lat, lon]))
        {
            location = location.with_coordinate(coordinate);
        }
        location
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub station: StationInput,
    #[serde(default)]
    pub filters: FavoriteFilterSet,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub added: bool,
    pub favorite: FavoriteResult,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub favorite_id: String,
    pub is_loading: bool,
    pub departures: Vec<DepartureRow>,
}

/// Result of a foreground trigger.
#[derive(Debug, Serialize)]
pub struct ForegroundResponse {
    /// Sync state after the trigger; absent when no peer is configured
    pub state: Option<SyncState>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(
        destinations: Option<&str>,
        platforms: Option<&str>,
        types: Option<&str>,
    ) -> FilterQuery {
        FilterQuery {
            destinations: destinations.map(str::to_string),
            platforms: platforms.map(str::to_string),
            transport_types: types.map(str::to_string),
        }
    }

    #[test]
    fn filter_query_splits_lists() {
        let filters = query(Some("Pasing, Tutzing ,"), Some("1,2"), Some("S-Bahn,ubahn"))
            .to_filters()
            .unwrap();

        let expected = FavoriteFilterSet::none()
            .with_destinations(["Tutzing", "Pasing"])
            .with_platforms(["2", "1"])
            .with_transport_types([TransportType::UBahn, TransportType::SBahn]);
        assert_eq!(filters, expected);
    }

    #[test]
    fn empty_filter_query_is_inactive() {
        let filters = query(Some(""), Some(" , "), None).to_filters().unwrap();
        assert!(!filters.is_active());
    }

    #[test]
    fn unknown_transport_type_is_reported() {
        assert_eq!(
            query(None, None, Some("S-Bahn,Zeppelin")).to_filters(),
            Err("Zeppelin".to_string())
        );
    }

    #[test]
    fn station_input_normalizes_id() {
        let input = StationInput {
            id: " de:09162:10:1:1 ".to_string(),
            name: Some("München, Pasing".to_string()),
            preferred_name: Some("Pasing".to_string()),
            parent_name: None,
            lat: Some(48.1497),
            lon: Some(f64::NAN),
        };
        let location = input.to_location(&IdNormalizer::default());

        assert_eq!(location.normalized_id(), "de:09162:10");
        assert_eq!(location.display_name(), "Pasing");
        assert!(location.coordinate().is_none());
    }

    #[test]
    fn favorites_request_reference_needs_both_coordinates() {
        let request = FavoritesRequest {
            sort: None,
            lat: Some(48.1),
            lon: None,
        };
        assert!(request.reference().is_none());
    }
}
