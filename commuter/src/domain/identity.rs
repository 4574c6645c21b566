//! Station identity normalization.
//!
//! The EFA provider hands out hierarchical ids like `de:09162:10:1:1`, where
//! the trailing components identify a platform or area inside a station. Two
//! favorites for the same physical station must compare equal no matter which
//! platform-level id the provider returned, so every identity comparison goes
//! through a single [`IdNormalizer`].

use std::fmt;
use std::str::FromStr;

/// Delimiter between id components.
const DELIMITER: char = ':';

/// Number of leading components that identify a station (`de:09162:10`).
pub const STATION_COMPONENTS: usize = 3;

/// Error returned when parsing an unknown normalization rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid normalization rule: {0}")]
pub struct InvalidNormalizationRule(String);

/// How raw provider ids collapse to station keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationRule {
    /// Keep the first `components` delimiter-separated parts.
    ///
    /// Ids with fewer parts are returned unchanged. Idempotent.
    StationPrefix { components: usize },

    /// Drop a leading `de:` and everything after the last delimiter.
    ///
    /// This is the companion app's legacy rule. It is not idempotent, so it
    /// must be applied exactly once per raw id.
    StripLastSegment,
}

impl Default for NormalizationRule {
    fn default() -> Self {
        Self::StationPrefix {
            components: STATION_COMPONENTS,
        }
    }
}

impl FromStr for NormalizationRule {
    type Err = InvalidNormalizationRule;

    /// Parses `prefix`, `prefix:N` or `strip-last`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "prefix" => Ok(Self::default()),
            "strip-last" => Ok(Self::StripLastSegment),
            _ => {
                let n = s
                    .strip_prefix("prefix:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| InvalidNormalizationRule(s.to_string()))?;
                Ok(Self::StationPrefix { components: n })
            }
        }
    }
}

impl fmt::Display for NormalizationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StationPrefix { components } => write!(f, "prefix:{components}"),
            Self::StripLastSegment => f.write_str("strip-last"),
        }
    }
}

/// Canonicalizes raw station ids into comparison keys.
///
/// # Examples
///
/// ```
/// use commuter::domain::IdNormalizer;
///
/// let normalizer = IdNormalizer::default();
/// assert_eq!(normalizer.normalize("de:09162:10:1:1"), "de:09162:10");
/// assert_eq!(normalizer.normalize("de:09162:10"), "de:09162:10");
/// assert_eq!(normalizer.normalize(""), "");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdNormalizer {
    rule: NormalizationRule,
}

impl IdNormalizer {
    /// Create a normalizer applying the given rule.
    pub fn new(rule: NormalizationRule) -> Self {
        Self { rule }
    }

    /// The rule this normalizer applies.
    pub fn rule(&self) -> NormalizationRule {
        self.rule
    }

    /// Normalize a raw provider id. Any string is valid input.
    pub fn normalize(&self, raw: &str) -> String {
        match self.rule {
            NormalizationRule::StationPrefix { components } => keep_prefix(raw, components),
            NormalizationRule::StripLastSegment => strip_last_segment(raw),
        }
    }
}

fn keep_prefix(raw: &str, components: usize) -> String {
    // Byte offset of the delimiter that ends the `components`-th part.
    match raw.match_indices(DELIMITER).nth(components.saturating_sub(1)) {
        Some((end, _)) if components > 0 => raw[..end].to_string(),
        _ => raw.to_string(),
    }
}

fn strip_last_segment(raw: &str) -> String {
    let trimmed = raw.strip_prefix("de:").unwrap_or(raw);
    match trimmed.rfind(DELIMITER) {
        Some(idx) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_id_collapses_to_station() {
        let n = IdNormalizer::default();
        assert_eq!(n.normalize("de:09162:10:1:1"), "de:09162:10");
        assert_eq!(n.normalize("de:09162:6:2:3"), "de:09162:6");
    }

    #[test]
    fn short_ids_are_unchanged() {
        let n = IdNormalizer::default();
        assert_eq!(n.normalize("de:09162:10"), "de:09162:10");
        assert_eq!(n.normalize("de:09162"), "de:09162");
        assert_eq!(n.normalize("1000010"), "1000010");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn trailing_delimiter() {
        let n = IdNormalizer::default();
        assert_eq!(n.normalize("a:b:c:"), "a:b:c");
        assert_eq!(n.normalize(":::"), "::");
    }

    #[test]
    fn strip_last_segment_rule() {
        let n = IdNormalizer::new(NormalizationRule::StripLastSegment);
        assert_eq!(n.normalize("de:09162:10:1:1"), "09162:10:1");
        assert_eq!(n.normalize("09162"), "09162");
        assert_eq!(n.normalize("de:"), "");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn strip_last_segment_must_not_be_reapplied() {
        let n = IdNormalizer::new(NormalizationRule::StripLastSegment);
        let once = n.normalize("de:09162:10:1:1");
        assert_eq!(once, "09162:10:1");
        assert_eq!(n.normalize(&once), "09162:10");
    }

    #[test]
    fn parse_rules() {
        assert_eq!("prefix".parse(), Ok(NormalizationRule::default()));
        assert_eq!(
            "prefix:4".parse(),
            Ok(NormalizationRule::StationPrefix { components: 4 })
        );
        assert_eq!("strip-last".parse(), Ok(NormalizationRule::StripLastSegment));
        assert!("prefix:0".parse::<NormalizationRule>().is_err());
        assert!("suffix".parse::<NormalizationRule>().is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for rule in [
            NormalizationRule::default(),
            NormalizationRule::StationPrefix { components: 2 },
            NormalizationRule::StripLastSegment,
        ] {
            assert_eq!(rule.to_string().parse(), Ok(rule));
        }
    }
}
