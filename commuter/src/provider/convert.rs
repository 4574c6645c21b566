//! Conversion from EFA DTOs to domain types.
//!
//! Malformed records are logged and skipped rather than failing the whole
//! response.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::domain::{
    Coordinate, DepartureEvent, IdNormalizer, StationLocation, TransportType,
};

use super::types::{
    AssignedStop, DepartureResponse, Location, StopEvent, StopFinderResponse, StopPoint,
};

/// Line label shown when the provider sends none.
const UNKNOWN_LINE: &str = "?";

/// Destination shown when the provider sends none.
const UNKNOWN_DESTINATION: &str = "Unbekanntes Ziel";

/// Stop finder result types that have departures.
const STOP_TYPES: [&str; 2] = ["stop", "platform"];

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Convert a departure monitor response, skipping unusable events.
pub fn convert_departures(response: &DepartureResponse) -> Vec<DepartureEvent> {
    let stop_events = response.stop_events.as_deref().unwrap_or(&[]);
    let mut results = Vec::with_capacity(stop_events.len());

    for (index, event) in stop_events.iter().enumerate() {
        match convert_stop_event(event) {
            Ok(converted) => results.push(converted),
            Err(e) => warn!(index, error = %e, "skipping stop event"),
        }
    }

    results
}

/// Convert a single stop event.
pub fn convert_stop_event(event: &StopEvent) -> Result<DepartureEvent, ConversionError> {
    let transportation = event
        .transportation
        .as_ref()
        .ok_or(ConversionError::MissingField("transportation"))?;

    let line = transportation
        .number
        .as_deref()
        .or(transportation.disassembled_name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_LINE);

    let destination = transportation
        .destination
        .as_ref()
        .and_then(|d| d.name.as_deref())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_DESTINATION);

    let mode = transportation
        .product
        .as_ref()
        .and_then(|p| {
            p.name.clone().or_else(|| {
                p.product_class
                    .and_then(TransportType::from_product_class)
                    .map(|t| t.raw_value().to_string())
            })
        })
        .unwrap_or_default();

    let mut converted = DepartureEvent::new(line, destination)
        .with_mode(mode)
        .with_platform_candidates(platform_candidates(event.location.as_ref()))
        .with_onward_stops(
            event
                .onward_locations
                .iter()
                .flatten()
                .filter_map(stop_name),
        );

    if let Some(planned) = &event.departure_time_planned {
        converted = converted.with_planned(planned.as_str());
    }
    if let Some(estimated) = &event.departure_time_estimated {
        converted = converted.with_estimated(estimated.as_str());
    }
    converted.is_realtime = event.is_realtime_controlled.unwrap_or(false);

    Ok(converted)
}

/// Platform labels in priority order: platform name, planned platform name,
/// raw platform.
fn platform_candidates(location: Option<&StopPoint>) -> [Option<String>; 3] {
    let props = location.and_then(|l| l.properties.clone()).unwrap_or_default();
    [props.platform_name, props.planned_platform_name, props.platform]
}

fn stop_name(stop: &StopPoint) -> Option<String> {
    stop.name
        .as_deref()
        .or(stop.parent.as_ref().and_then(|p| p.name.as_deref()))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Convert stop finder hits to stations, keeping only stops.
pub fn convert_stop_finder(
    response: &StopFinderResponse,
    normalizer: &IdNormalizer,
) -> Vec<StationLocation> {
    response
        .locations
        .iter()
        .flatten()
        .filter(|l| {
            let is_stop = l
                .kind
                .as_deref()
                .is_none_or(|k| STOP_TYPES.contains(&k));
            if !is_stop {
                debug!(id = %l.id, kind = ?l.kind, "skipping non-stop location");
            }
            is_stop
        })
        .map(|l| convert_location(l, normalizer))
        .collect()
}

fn convert_location(location: &Location, normalizer: &IdNormalizer) -> StationLocation {
    let mut station = StationLocation::new(location.id.as_str(), normalizer);
    if let Some(name) = &location.name {
        station = station.with_name(name.as_str());
    }
    if let Some(short) = &location.disassembled_name {
        station = station.with_preferred_name(short.as_str());
    }
    if let Some(coordinate) = location.coord.as_deref().and_then(Coordinate::from_lat_lon_slice) {
        station = station.with_coordinate(coordinate);
    }
    if let Some(parent) = location.parent.as_ref().and_then(|p| p.name.as_deref()) {
        station = station.with_parent_name(parent);
    }
    if let Some(distance) = location.distance {
        station = station.with_provider_distance(distance);
    }
    station
}

/// Flatten the stops assigned to a proximity search's locations.
///
/// Stops assigned to more than one location are kept once.
pub fn convert_nearby(
    response: &StopFinderResponse,
    normalizer: &IdNormalizer,
) -> Vec<StationLocation> {
    let mut seen = HashSet::new();
    response
        .locations
        .iter()
        .flatten()
        .flat_map(|l| l.assigned_stops.iter().flatten())
        .filter(|stop| seen.insert(stop.id.clone()))
        .map(|stop| convert_assigned_stop(stop, normalizer))
        .collect()
}

fn convert_assigned_stop(stop: &AssignedStop, normalizer: &IdNormalizer) -> StationLocation {
    let mut station = StationLocation::new(stop.id.as_str(), normalizer);
    if let Some(name) = &stop.name {
        station = station.with_name(name.as_str()).with_preferred_name(name.as_str());
    }
    if let Some(coordinate) = stop.coord.as_deref().and_then(Coordinate::from_lat_lon_slice) {
        station = station.with_coordinate(coordinate);
    }
    if let Some(parent) = stop.parent.as_ref().and_then(|p| p.name.as_deref()) {
        station = station.with_parent_name(parent);
    }
    if let Some(distance) = stop.distance {
        station = station.with_provider_distance(distance);
    }
    station
}

/// The EFA coordinate query format: `lon:lat:WGS84[DD.ddddd]`.
pub fn coord_query(coordinate: &Coordinate) -> String {
    format!("{}:{}:WGS84[DD.ddddd]", coordinate.lon, coordinate.lat)
}
