//! Station locations.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use super::identity::IdNormalizer;

/// Label used when the provider supplies no usable name.
pub const UNKNOWN_STATION: &str = "Unbekannte Station";

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build from the provider's `[lat, lon]` array.
    ///
    /// Returns `None` if fewer than two values are present or either is not finite.
    pub fn from_lat_lon_slice(values: &[f64]) -> Option<Self> {
        match values {
            [lat, lon, ..] if lat.is_finite() && lon.is_finite() => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }

    /// Great-circle distance in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        self.as_point().haversine_distance(&other.as_point())
    }

    fn as_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// A station (or stop) as returned by the provider.
///
/// Immutable once constructed: the normalized id is derived from the raw id
/// exactly once, through the normalizer passed to [`StationLocation::new`].
/// Use the `with_*` builders while constructing; they consume and return a
/// new value.
///
/// # Examples
///
/// ```
/// use commuter::domain::{IdNormalizer, StationLocation};
///
/// let station = StationLocation::new("de:09162:6:1:1", &IdNormalizer::default())
///     .with_name("München, Hauptbahnhof")
///     .with_preferred_name("Hauptbahnhof");
///
/// assert_eq!(station.normalized_id(), "de:09162:6");
/// assert_eq!(station.display_name(), "Hauptbahnhof");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    id: String,
    normalized_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_distance: Option<f64>,
}

impl StationLocation {
    /// Create a location from a raw provider id.
    pub fn new(id: impl Into<String>, normalizer: &IdNormalizer) -> Self {
        let id = id.into();
        let normalized_id = normalizer.normalize(&id);
        Self {
            id,
            normalized_id,
            name: None,
            preferred_name: None,
            coordinate: None,
            parent_name: None,
            provider_distance: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    pub fn with_preferred_name(mut self, name: impl Into<String>) -> Self {
        self.preferred_name = non_empty(name.into());
        self
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_parent_name(mut self, name: impl Into<String>) -> Self {
        self.parent_name = non_empty(name.into());
        self
    }

    /// Distance in meters as reported by a proximity query.
    pub fn with_provider_distance(mut self, meters: f64) -> Self {
        self.provider_distance = meters.is_finite().then_some(meters);
        self
    }

    /// Re-derive the normalized id with another normalizer.
    ///
    /// Used when a location arrives from storage or from the peer device,
    /// whose normalization rule may differ from ours.
    pub fn renormalized(&self, normalizer: &IdNormalizer) -> Self {
        Self {
            normalized_id: normalizer.normalize(&self.id),
            ..self.clone()
        }
    }

    /// Raw provider id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Station-level comparison key.
    pub fn normalized_id(&self) -> &str {
        &self.normalized_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn preferred_name(&self) -> Option<&str> {
        self.preferred_name.as_deref()
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    pub fn provider_distance(&self) -> Option<f64> {
        self.provider_distance
    }

    /// Preferred short name, then full name, then a generic label.
    pub fn display_name(&self) -> &str {
        self.preferred_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(UNKNOWN_STATION)
    }

    /// Distance to `reference` in meters.
    ///
    /// A provider-supplied distance wins over the computed great-circle
    /// distance. `None` if neither is available.
    pub fn distance_from(&self, reference: &Coordinate) -> Option<f64> {
        self.provider_distance
            .or_else(|| self.coordinate.map(|c| reference.distance_to(&c)))
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NormalizationRule;

    fn station(id: &str) -> StationLocation {
        StationLocation::new(id, &IdNormalizer::default())
    }

    #[test]
    fn normalized_on_construction() {
        let s = station("de:09162:10:1:1");
        assert_eq!(s.id(), "de:09162:10:1:1");
        assert_eq!(s.normalized_id(), "de:09162:10");
    }

    #[test]
    fn display_name_fallbacks() {
        let s = station("x").with_name("Marienplatz, München");
        assert_eq!(s.display_name(), "Marienplatz, München");

        let s = s.with_preferred_name("Marienplatz");
        assert_eq!(s.display_name(), "Marienplatz");

        assert_eq!(station("x").display_name(), UNKNOWN_STATION);
        assert_eq!(station("x").with_name("  ").display_name(), UNKNOWN_STATION);
    }

    #[test]
    fn renormalize_with_other_rule() {
        let s = station("de:09162:10:1:1");
        let legacy = IdNormalizer::new(NormalizationRule::StripLastSegment);
        let r = s.renormalized(&legacy);
        assert_eq!(r.normalized_id(), "09162:10:1");
        assert_eq!(r.id(), s.id());
        assert_eq!(s.normalized_id(), "de:09162:10");
    }

    #[test]
    fn coordinate_from_slice() {
        assert_eq!(
            Coordinate::from_lat_lon_slice(&[48.14, 11.56]),
            Some(Coordinate::new(48.14, 11.56))
        );
        assert_eq!(Coordinate::from_lat_lon_slice(&[48.14]), None);
        assert_eq!(Coordinate::from_lat_lon_slice(&[f64::NAN, 11.0]), None);
    }

    #[test]
    fn haversine_distance() {
        // Marienplatz → Hauptbahnhof is roughly 1.1 km.
        let marienplatz = Coordinate::new(48.1374, 11.5755);
        let hbf = Coordinate::new(48.1402, 11.5600);
        let d = marienplatz.distance_to(&hbf);
        assert!((1_000.0..1_300.0).contains(&d), "distance was {d}");
        assert_eq!(marienplatz.distance_to(&marienplatz), 0.0);
    }

    #[test]
    fn provider_distance_wins() {
        let reference = Coordinate::new(48.0, 11.0);
        let s = station("x")
            .with_coordinate(Coordinate::new(48.1, 11.1))
            .with_provider_distance(42.0);
        assert_eq!(s.distance_from(&reference), Some(42.0));

        let s = station("x").with_coordinate(reference);
        assert_eq!(s.distance_from(&reference), Some(0.0));

        assert_eq!(station("x").distance_from(&reference), None);
    }

    #[test]
    fn serde_roundtrip_skips_absent_fields() {
        let s = station("de:09162:10:1:1").with_name("Odeonsplatz");
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("coordinate"));
        let back: StationLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::NormalizationRule;
    use proptest::prelude::*;

    fn any_rule() -> impl Strategy<Value = NormalizationRule> {
        prop_oneof![
            (1usize..6).prop_map(|components| NormalizationRule::StationPrefix { components }),
            Just(NormalizationRule::StripLastSegment),
        ]
    }

    proptest! {
        /// Re-keying always starts from the raw id, so it is stable under
        /// every rule, including ones that are not idempotent on their own.
        #[test]
        fn renormalizing_is_stable(
            raw in "[a-z0-9:]{0,24}",
            first in any_rule(),
            second in any_rule(),
        ) {
            let first = IdNormalizer::new(first);
            let second = IdNormalizer::new(second);
            let location = StationLocation::new(raw.as_str(), &first);

            let once = location.renormalized(&second);
            prop_assert_eq!(once.normalized_id(), second.normalize(&raw));
            prop_assert_eq!(&once.renormalized(&second), &once);
            prop_assert_eq!(once.id(), raw.as_str());
        }
    }
}
