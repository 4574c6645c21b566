//! Departure events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::parse_optional;
use super::transport::TransportType;

/// Maximum number of platform label sources kept per event.
pub const MAX_PLATFORM_CANDIDATES: usize = 3;

/// One scheduled or real-time departure from a station.
///
/// At least one of `planned_time` / `estimated_time` is expected; events
/// with neither still construct but sort last and display a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureEvent {
    pub planned_time: Option<String>,
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub is_realtime: bool,
    pub line_label: String,
    pub final_destination_name: String,
    /// Alternative platform labels in priority order; first non-empty wins.
    #[serde(default)]
    pub platform_candidates: Vec<Option<String>>,
    /// Stops further along the route, used only for destination filtering.
    #[serde(default)]
    pub onward_stop_names: Vec<String>,
    /// Free-text transport category, e.g. `"S-Bahn"` or `"Regionalbus"`.
    #[serde(default)]
    pub mode_class_name: String,
}

impl DepartureEvent {
    /// Create an event with the given line and destination and no times.
    pub fn new(line_label: impl Into<String>, final_destination_name: impl Into<String>) -> Self {
        Self {
            planned_time: None,
            estimated_time: None,
            is_realtime: false,
            line_label: line_label.into(),
            final_destination_name: final_destination_name.into(),
            platform_candidates: Vec::new(),
            onward_stop_names: Vec::new(),
            mode_class_name: String::new(),
        }
    }

    pub fn with_planned(mut self, time: impl Into<String>) -> Self {
        self.planned_time = Some(time.into());
        self
    }

    /// Set the live estimate, marking the event as real-time.
    pub fn with_estimated(mut self, time: impl Into<String>) -> Self {
        self.estimated_time = Some(time.into());
        self.is_realtime = true;
        self
    }

    pub fn with_platform_candidates<I>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        self.platform_candidates = candidates
            .into_iter()
            .take(MAX_PLATFORM_CANDIDATES)
            .collect();
        self
    }

    /// Convenience for a single known platform.
    pub fn with_platform(self, platform: impl Into<String>) -> Self {
        self.with_platform_candidates([Some(platform.into())])
    }

    pub fn with_onward_stops<I, S>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.onward_stop_names = stops.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode_class_name: impl Into<String>) -> Self {
        self.mode_class_name = mode_class_name.into();
        self
    }

    /// The effective timestamp string: estimate if present, else plan.
    pub fn effective_time(&self) -> Option<&str> {
        self.estimated_time
            .as_deref()
            .or(self.planned_time.as_deref())
    }

    /// The effective instant, `None` if absent or unparseable.
    pub fn effective_instant(&self) -> Option<DateTime<Utc>> {
        parse_optional(self.effective_time())
    }

    /// First non-empty platform label in priority order.
    pub fn effective_platform(&self) -> Option<&str> {
        self.platform_candidates
            .iter()
            .flatten()
            .map(String::as_str)
            .find(|p| !p.trim().is_empty())
    }

    pub fn transport_type(&self) -> Option<TransportType> {
        TransportType::classify(&self.mode_class_name)
    }
}
