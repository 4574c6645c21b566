//! Departure time display.
//!
//! Turns planned/estimated timestamps into the three things a departure row
//! shows: a time label, an optional delay badge and an urgency flag.
//!
//! The label tracks the live estimate while urgency tracks the original
//! schedule, so a late train whose planned time has arrived is flagged urgent
//! even though its label still counts down.

use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use serde::Serialize;

use crate::domain::{DepartureEvent, parse_instant, parse_optional};

/// Label shown when a timestamp cannot be parsed.
pub const SENTINEL: &str = "--:--";

/// Default threshold up to which departures show relative minutes.
pub const DEFAULT_RELATIVE_THRESHOLD_MINS: i64 = 20;

/// How far ahead of the planned time a departure counts as urgent.
const URGENCY_WINDOW_SECS: i64 = 60;

/// Relative ("5 min") or absolute ("14:30") rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// Relative minutes up to the threshold, clock time beyond it.
    #[default]
    Relative,
    /// Always clock time.
    Absolute,
}

/// Time zone used for clock-time labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local zone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

/// Localized words used in labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLabels {
    pub now: String,
    pub minutes: String,
}

impl DisplayLabels {
    pub fn german() -> Self {
        Self {
            now: "Jetzt".to_string(),
            minutes: "min".to_string(),
        }
    }

    pub fn english() -> Self {
        Self {
            now: "Now".to_string(),
            minutes: "min".to_string(),
        }
    }
}

impl Default for DisplayLabels {
    fn default() -> Self {
        Self::german()
    }
}

/// Configuration for the time formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormatConfig {
    /// Departures at most this many minutes away show relative minutes.
    pub relative_threshold_mins: i64,
    pub mode: DisplayMode,
    pub zone: DisplayZone,
    pub labels: DisplayLabels,
}

impl TimeFormatConfig {
    pub fn with_mode(mut self, mode: DisplayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_labels(mut self, labels: DisplayLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_relative_threshold(mut self, mins: i64) -> Self {
        self.relative_threshold_mins = mins;
        self
    }
}

impl Default for TimeFormatConfig {
    fn default() -> Self {
        Self {
            relative_threshold_mins: DEFAULT_RELATIVE_THRESHOLD_MINS,
            mode: DisplayMode::default(),
            zone: DisplayZone::default(),
            labels: DisplayLabels::default(),
        }
    }
}

/// What a departure row shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartureDisplay {
    pub text: String,
    /// `"+N"` when the departure runs N > 0 minutes late.
    pub delay_text: Option<String>,
    pub is_urgent: bool,
}

impl DepartureDisplay {
    fn sentinel(is_urgent: bool) -> Self {
        Self {
            text: SENTINEL.to_string(),
            delay_text: None,
            is_urgent,
        }
    }
}

/// Formats departure times relative to a reference instant.
#[derive(Debug, Clone, Default)]
pub struct TimeFormatter {
    config: TimeFormatConfig,
}

impl TimeFormatter {
    pub fn new(config: TimeFormatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeFormatConfig {
        &self.config
    }

    /// Format a departure row.
    ///
    /// Never fails: an unparseable effective time yields [`SENTINEL`] and no
    /// delay.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use commuter::display::TimeFormatter;
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
    /// let f = TimeFormatter::default();
    ///
    /// let d = f.format(Some("2024-03-15T10:05:00Z"), Some("2024-03-15T10:10:00Z"), now);
    /// assert_eq!(d.text, "10 min");
    /// assert_eq!(d.delay_text.as_deref(), Some("+5"));
    /// assert!(!d.is_urgent);
    /// ```
    pub fn format(
        &self,
        planned: Option<&str>,
        estimated: Option<&str>,
        now: DateTime<Utc>,
    ) -> DepartureDisplay {
        let is_urgent = is_urgent(planned, now);

        let Some(effective) = estimated.or(planned) else {
            return DepartureDisplay::sentinel(is_urgent);
        };
        let Ok(effective) = parse_instant(effective) else {
            return DepartureDisplay::sentinel(is_urgent);
        };

        let text = match self.config.mode {
            DisplayMode::Absolute => self.clock_time(effective),
            DisplayMode::Relative => {
                let minutes = minutes_until(effective, now);
                if minutes <= 0 {
                    self.config.labels.now.clone()
                } else if minutes <= self.config.relative_threshold_mins {
                    format!("{minutes} {}", self.config.labels.minutes)
                } else {
                    self.clock_time(effective)
                }
            }
        };

        DepartureDisplay {
            text,
            delay_text: delay_minutes(planned, estimated).map(|d| format!("+{d}")),
            is_urgent,
        }
    }

    /// Format an event's row.
    pub fn display(&self, event: &DepartureEvent, now: DateTime<Utc>) -> DepartureDisplay {
        self.format(
            event.planned_time.as_deref(),
            event.estimated_time.as_deref(),
            now,
        )
    }

    /// `HH:MM` in the configured zone.
    fn clock_time(&self, instant: DateTime<Utc>) -> String {
        match self.config.zone {
            DisplayZone::Local => instant.with_timezone(&Local).format("%H:%M").to_string(),
            DisplayZone::Fixed(offset) => {
                instant.with_timezone(&offset).format("%H:%M").to_string()
            }
        }
    }
}

/// Whole minutes from `now` until `instant`, rounded toward negative infinity.
pub fn minutes_until(instant: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (instant - now).num_milliseconds().div_euclid(60_000)
}

/// Positive delay in whole minutes, `None` for on-time, early or unknown.
///
/// Both timestamps must be present and parse.
pub fn delay_minutes(planned: Option<&str>, estimated: Option<&str>) -> Option<i64> {
    let planned = parse_optional(planned)?;
    let estimated = parse_optional(estimated)?;
    let delay = (estimated - planned).num_seconds() / 60;
    (delay > 0).then_some(delay)
}

/// Urgent iff the planned departure is at most one minute away (or past).
///
/// Only the planned time counts; a missing or unparseable plan is never
/// urgent.
pub fn is_urgent(planned: Option<&str>, now: DateTime<Utc>) -> bool {
    parse_optional(planned)
        .is_some_and(|planned| planned - now <= Duration::seconds(URGENCY_WINDOW_SECS))
}
