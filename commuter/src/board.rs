//! The live departure board for one station.

use tracing::debug;

use crate::domain::{DepartureEvent, FavoriteFilterSet};
use crate::filter::{available_destinations, available_platforms, filter_departures};
use crate::ordering::sort_by_time;
use crate::provider::{DepartureProvider, FetchError};

/// Fetch a station's departures, keep those matching `filters`, and sort
/// them by effective time.
pub async fn filtered_and_sorted(
    provider: &dyn DepartureProvider,
    station_id: &str,
    filters: &FavoriteFilterSet,
) -> Result<Vec<DepartureEvent>, FetchError> {
    let events = provider.fetch_departures(station_id).await?;
    let fetched = events.len();

    let mut events = if filters.is_active() {
        filter_departures(&events, filters)
    } else {
        events
    };
    sort_by_time(&mut events);

    debug!(station_id, fetched, kept = events.len(), "built departure board");
    Ok(events)
}

/// Filter choices offered for a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardOptions {
    pub platforms: Vec<String>,
    pub destinations: Vec<String>,
}

impl BoardOptions {
    /// Collect the platforms and destinations present in `events`.
    pub fn from_events(events: &[DepartureEvent]) -> Self {
        Self {
            platforms: available_platforms(events),
            destinations: available_destinations(events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportType;
    use crate::provider::MockProvider;

    fn provider() -> MockProvider {
        MockProvider::new().with_board(
            "de:09162:6",
            vec![
                DepartureEvent::new("U2", "Messestadt Ost")
                    .with_planned("2024-03-15T09:10:00Z")
                    .with_mode("U-Bahn")
                    .with_platform("2"),
                DepartureEvent::new("S1", "Freising")
                    .with_planned("2024-03-15T09:02:00Z")
                    .with_estimated("2024-03-15T09:12:00Z")
                    .with_mode("S-Bahn")
                    .with_platform("27"),
                DepartureEvent::new("U1", "Mangfallplatz")
                    .with_planned("2024-03-15T09:05:00Z")
                    .with_mode("U-Bahn")
                    .with_platform("1"),
            ],
        )
    }

    #[tokio::test]
    async fn unfiltered_board_is_sorted_by_effective_time() {
        let events = filtered_and_sorted(&provider(), "de:09162:6", &FavoriteFilterSet::none())
            .await
            .unwrap();

        let lines: Vec<_> = events.iter().map(|e| e.line_label.as_str()).collect();
        assert_eq!(lines, vec!["U1", "U2", "S1"]);
    }

    #[tokio::test]
    async fn filters_narrow_the_board() {
        let filters = FavoriteFilterSet::none().with_transport_types([TransportType::UBahn]);
        let events = filtered_and_sorted(&provider(), "de:09162:6", &filters)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.mode_class_name == "U-Bahn"));
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let provider = provider();
        provider.fail_next_fetch("down");
        let result = filtered_and_sorted(&provider, "de:09162:6", &FavoriteFilterSet::none()).await;
        assert!(matches!(result, Err(FetchError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn options_list_platforms_and_destinations() {
        let events = filtered_and_sorted(&provider(), "de:09162:6", &FavoriteFilterSet::none())
            .await
            .unwrap();
        let options = BoardOptions::from_events(&events);

        assert_eq!(options.platforms, vec!["1", "2", "27"]);
        assert_eq!(options.destinations.len(), 3);
    }
}
