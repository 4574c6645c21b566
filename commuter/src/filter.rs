//! Departure filtering against favorite filter sets.
//!
//! A departure matches a filter set iff it satisfies every present axis;
//! absent axes are automatically satisfied. The same predicate drives the
//! live board for a single station and the per-favorite previews.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::domain::{DepartureEvent, FavoriteFilterSet};

/// Whether `event` satisfies all present axes of `filters`.
///
/// ```
/// use commuter::domain::{DepartureEvent, FavoriteFilterSet};
/// use commuter::filter::matches;
///
/// let event = DepartureEvent::new("S6", "Tutzing").with_onward_stops(["Pasing", "Starnberg"]);
/// assert!(matches(&event, &FavoriteFilterSet::none()));
/// assert!(matches(&event, &FavoriteFilterSet::none().with_destinations(["starnberg"])));
/// assert!(!matches(&event, &FavoriteFilterSet::none().with_destinations(["Erding"])));
/// ```
pub fn matches(event: &DepartureEvent, filters: &FavoriteFilterSet) -> bool {
    filters
        .destinations()
        .is_none_or(|terms| matches_destination(event, terms))
        && filters
            .platforms()
            .is_none_or(|platforms| matches_platform(event, platforms))
        && filters.transport_types().is_none_or(|types| {
            event
                .transport_type()
                .is_some_and(|t| types.contains(&t))
        })
}

/// Keep only the events matching `filters`, preserving order.
pub fn filter_departures<'a, I>(events: I, filters: &FavoriteFilterSet) -> Vec<DepartureEvent>
where
    I: IntoIterator<Item = &'a DepartureEvent>,
{
    events
        .into_iter()
        .filter(|e| matches(e, filters))
        .cloned()
        .collect()
}

/// Case-insensitive substring match of any term against the final
/// destination or any onward stop.
fn matches_destination(event: &DepartureEvent, terms: &BTreeSet<String>) -> bool {
    let final_destination = event.final_destination_name.to_lowercase();
    let onward: Vec<String> = event
        .onward_stop_names
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    terms.iter().any(|term| {
        let term = term.to_lowercase();
        final_destination.contains(&term) || onward.iter().any(|stop| stop.contains(&term))
    })
}

/// Exact equality with the effective platform. No platform, no match.
fn matches_platform(event: &DepartureEvent, platforms: &BTreeSet<String>) -> bool {
    event
        .effective_platform()
        .is_some_and(|p| platforms.contains(p))
}

/// Distinct effective platforms on a board, for a platform picker.
pub fn available_platforms(events: &[DepartureEvent]) -> Vec<String> {
    let distinct: BTreeSet<&str> = events.iter().filter_map(|e| e.effective_platform()).collect();
    sort_platforms(distinct.into_iter().map(str::to_string).collect())
}

/// Distinct destination names reachable from a board: final destinations
/// plus every onward stop, sorted case-insensitively.
pub fn available_destinations(events: &[DepartureEvent]) -> Vec<String> {
    let distinct: BTreeSet<&str> = events
        .iter()
        .flat_map(|e| {
            std::iter::once(e.final_destination_name.as_str())
                .chain(e.onward_stop_names.iter().map(String::as_str))
        })
        .filter(|name| !name.trim().is_empty())
        .collect();

    let mut names: Vec<String> = distinct.into_iter().map(str::to_string).collect();
    names.sort_by_cached_key(|n| n.to_lowercase());
    names
}

/// Sort platform labels numerically where both parse as integers,
/// otherwise case-insensitively.
pub fn sort_platforms(mut platforms: Vec<String>) -> Vec<String> {
    platforms.sort_by(|a, b| compare_platforms(a, b));
    platforms
}

fn compare_platforms(a: &str, b: &str) -> Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportType;

    fn event(line: &str, destination: &str) -> DepartureEvent {
        DepartureEvent::new(line, destination)
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = FavoriteFilterSet::none();
        assert!(matches(&event("S1", "Freising"), &f));
        assert!(matches(&DepartureEvent::new("", ""), &f));
    }

    #[test]
    fn destination_matches_final_destination_case_insensitively() {
        let f = FavoriteFilterSet::none().with_destinations(["flughafen"]);
        assert!(matches(&event("S8", "Flughafen München"), &f));
        assert!(!matches(&event("S8", "Herrsching"), &f));
    }

    #[test]
    fn destination_matches_onward_stop() {
        let f = FavoriteFilterSet::none().with_destinations(["Marienplatz"]);
        let e = event("S3", "Holzkirchen").with_onward_stops(["Hauptbahnhof", "Marienplatz"]);
        assert!(matches(&e, &f));
    }

    #[test]
    fn any_destination_term_suffices() {
        let f = FavoriteFilterSet::none().with_destinations(["Erding", "Ostbahnhof"]);
        let e = event("S2", "Erding");
        assert!(matches(&e, &f));
    }

    #[test]
    fn platform_uses_effective_platform() {
        let f = FavoriteFilterSet::none().with_platforms(["2"]);
        let e = event("U6", "Garching").with_platform_candidates([
            Some("2".to_string()),
            Some("1".to_string()),
        ]);
        assert!(matches(&e, &f));

        let e = event("U6", "Garching").with_platform_candidates([
            Some("1".to_string()),
            Some("2".to_string()),
        ]);
        assert!(!matches(&e, &f));
    }

    #[test]
    fn platform_filter_rejects_unknown_platform() {
        let f = FavoriteFilterSet::none().with_platforms(["2"]);
        assert!(!matches(&event("U6", "Garching"), &f));
    }

    #[test]
    fn platform_is_exact() {
        let f = FavoriteFilterSet::none().with_platforms(["1"]);
        assert!(!matches(&event("S1", "x").with_platform("11"), &f));
        assert!(!matches(&event("S1", "x").with_platform("Gleis 1"), &f));
    }

    #[test]
    fn transport_type_membership() {
        let f = FavoriteFilterSet::none()
            .with_transport_types([TransportType::UBahn, TransportType::Tram]);
        assert!(matches(&event("U3", "x").with_mode("U-Bahn"), &f));
        assert!(matches(&event("19", "x").with_mode("Tram"), &f));
        assert!(!matches(&event("S1", "x").with_mode("S-Bahn"), &f));
        assert!(!matches(&event("?", "x").with_mode(""), &f));
    }

    #[test]
    fn all_axes_must_hold() {
        let f = FavoriteFilterSet::none()
            .with_destinations(["Pasing"])
            .with_platforms(["1"])
            .with_transport_types([TransportType::SBahn]);

        let good = event("S6", "Tutzing")
            .with_onward_stops(["Pasing"])
            .with_platform("1")
            .with_mode("S-Bahn");
        assert!(matches(&good, &f));

        assert!(!matches(&good.clone().with_platform("2"), &f));
        assert!(!matches(&good.clone().with_mode("Bus"), &f));
        assert!(!matches(&good.with_onward_stops(["Laim"]), &f));
    }

    #[test]
    fn filter_keeps_order() {
        let events = vec![
            event("S1", "Freising"),
            event("S2", "Erding"),
            event("S1", "Flughafen"),
        ];
        let f = FavoriteFilterSet::none().with_destinations(["F"]);
        let lines: Vec<_> = filter_departures(&events, &f)
            .into_iter()
            .map(|e| e.final_destination_name)
            .collect();
        assert_eq!(lines, vec!["Freising", "Flughafen"]);
    }

    #[test]
    fn platforms_sort_numerically() {
        let sorted = sort_platforms(vec![
            "10".into(),
            "2".into(),
            "b".into(),
            "1".into(),
            "A".into(),
        ]);
        assert_eq!(sorted, vec!["1", "2", "10", "A", "b"]);
    }

    #[test]
    fn available_platforms_are_distinct() {
        let events = vec![
            event("S1", "x").with_platform("3"),
            event("S2", "x").with_platform("1"),
            event("S3", "x").with_platform("3"),
            event("S4", "x"),
        ];
        assert_eq!(available_platforms(&events), vec!["1", "3"]);
    }

    #[test]
    fn available_destinations_include_onward_stops() {
        let events = vec![
            event("S1", "freising").with_onward_stops(["Feldmoching", "Neufahrn"]),
            event("S8", "Flughafen").with_onward_stops(["Neufahrn", ""]),
        ];
        assert_eq!(
            available_destinations(&events),
            vec!["Feldmoching", "Flughafen", "freising", "Neufahrn"]
        );
    }
}
