//! Deterministic ordering of departures, locations and favorites.
//!
//! Sorting an already sorted list is a no-op. Departures with equal times
//! keep their input order. Locations and favorites are totally ordered, with
//! names and then ids breaking ties, so the result never depends on input
//! order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, DepartureEvent, Favorite, StationLocation};

/// Sort departures ascending by effective time.
///
/// Events whose effective time is absent or unparseable go last, in input
/// order.
pub fn sort_by_time(events: &mut [DepartureEvent]) {
    events.sort_by_cached_key(|e| {
        let instant = e.effective_instant();
        (instant.is_none(), instant)
    });
}

/// Sort locations by distance from `reference`, or alphabetically without one.
///
/// With a reference, the provider's own distance is preferred; otherwise the
/// great-circle distance to the location's coordinate. Locations with
/// neither sort last.
pub fn sort_locations_by_distance(
    locations: &mut [StationLocation],
    reference: Option<&Coordinate>,
) {
    locations.sort_by(|a, b| compare_locations(a, b, reference));
}

fn compare_locations(
    a: &StationLocation,
    b: &StationLocation,
    reference: Option<&Coordinate>,
) -> Ordering {
    let by_distance = match reference {
        Some(reference) => distance_key(a, reference).total_cmp(&distance_key(b, reference)),
        None => Ordering::Equal,
    };
    by_distance
        .then_with(|| compare_names(a.display_name(), b.display_name()))
        .then_with(|| a.id().cmp(b.id()))
}

fn distance_key(location: &StationLocation, reference: &Coordinate) -> f64 {
    location.distance_from(reference).unwrap_or(f64::INFINITY)
}

/// Case-insensitive, then exact.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// How the favorites list is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteSortOption {
    #[default]
    Alphabetical,
    Distance,
}

impl FromStr for FavoriteSortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alphabetical" | "name" => Ok(Self::Alphabetical),
            "distance" => Ok(Self::Distance),
            other => Err(format!("unknown sort option: {other}")),
        }
    }
}

impl fmt::Display for FavoriteSortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alphabetical => f.write_str("alphabetical"),
            Self::Distance => f.write_str("distance"),
        }
    }
}

/// Sort favorites by display name or by distance.
///
/// Distance sorting without a reference falls back to alphabetical.
pub fn sort_favorites(
    favorites: &mut [Favorite],
    option: FavoriteSortOption,
    reference: Option<&Coordinate>,
) {
    let reference = match option {
        FavoriteSortOption::Distance => reference,
        FavoriteSortOption::Alphabetical => None,
    };
    favorites.sort_by(|a, b| {
        compare_locations(a.location(), b.location(), reference)
            .then_with(|| a.id().cmp(&b.id()))
    });
}

/// Human-readable distance: `850 m`, `1.2 km`, `12 km`.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.max(0.0) as u64)
    } else {
        let km = meters / 1000.0;
        if km < 10.0 {
            format!("{km:.1} km")
        } else {
            format!("{} km", km as u64)
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn arb_event() -> impl Strategy<Value = DepartureEvent> {
        (0usize..1000, proptest::option::of(-120i64..120), any::<bool>()).prop_map(
            |(tag, offset, garbage)| {
                let e = DepartureEvent::new(tag.to_string(), "x");
                match (offset, garbage) {
                    (Some(mins), false) => {
                        let base = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
                        e.with_planned((base + Duration::minutes(mins)).to_rfc3339())
                    }
                    (Some(_), true) => e.with_planned("not a time"),
                    (None, _) => e,
                }
            },
        )
    }

    proptest! {
        /// Sorting twice equals sorting once.
        #[test]
        fn sort_is_idempotent(mut events in proptest::collection::vec(arb_event(), 0..20)) {
            sort_by_time(&mut events);
            let once = events.clone();
            sort_by_time(&mut events);
            prop_assert_eq!(events, once);
        }

        /// Output is ordered: every parseable time precedes every unparseable
        /// one, and parseable times are non-decreasing.
        #[test]
        fn sort_is_ordered(mut events in proptest::collection::vec(arb_event(), 0..20)) {
            sort_by_time(&mut events);
            let keys: Vec<_> = events.iter().map(|e| e.effective_instant()).collect();
            for pair in keys.windows(2) {
                match (pair[0], pair[1]) {
                    (Some(a), Some(b)) => prop_assert!(a <= b),
                    (None, Some(_)) => prop_assert!(false, "unparseable before parseable"),
                    _ => {}
                }
            }
        }

        /// Sorting never drops or duplicates events.
        #[test]
        fn sort_is_permutation(events in proptest::collection::vec(arb_event(), 0..20)) {
            let mut sorted = events.clone();
            sort_by_time(&mut sorted);
            let mut a: Vec<_> = events.iter().map(|e| e.line_label.clone()).collect();
            let mut b: Vec<_> = sorted.iter().map(|e| e.line_label.clone()).collect();
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }
    }
}
