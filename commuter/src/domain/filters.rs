//! Favorite filter sets.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use super::transport::TransportType;

/// Destination, platform and transport-type constraints of a favorite.
///
/// Each axis is either absent (no constraint) or a non-empty set. Empty
/// input collapses to absent at construction, and sets compare without
/// regard to insertion order, so two filter sets built from the same terms
/// in any order are equal.
///
/// ```
/// use commuter::domain::FavoriteFilterSet;
///
/// let a = FavoriteFilterSet::default().with_platforms(["2", "1"]);
/// let b = FavoriteFilterSet::default().with_platforms(["1", "2"]);
/// assert_eq!(a, b);
///
/// let empty = FavoriteFilterSet::default().with_destinations(Vec::<String>::new());
/// assert_eq!(empty, FavoriteFilterSet::default());
/// assert!(!empty.is_active());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FavoriteFilterSet {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_strings"
    )]
    destinations: Option<BTreeSet<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_strings"
    )]
    platforms: Option<BTreeSet<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_empty_types"
    )]
    transport_types: Option<BTreeSet<TransportType>>,
}

impl FavoriteFilterSet {
    /// A filter set with no constraints.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_destinations<I, S>(mut self, destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destinations = string_set(destinations);
        self
    }

    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = string_set(platforms);
        self
    }

    pub fn with_transport_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = TransportType>,
    {
        let set: BTreeSet<TransportType> = types.into_iter().collect();
        self.transport_types = (!set.is_empty()).then_some(set);
        self
    }

    pub fn destinations(&self) -> Option<&BTreeSet<String>> {
        self.destinations.as_ref()
    }

    pub fn platforms(&self) -> Option<&BTreeSet<String>> {
        self.platforms.as_ref()
    }

    pub fn transport_types(&self) -> Option<&BTreeSet<TransportType>> {
        self.transport_types.as_ref()
    }

    /// Whether any axis constrains departures.
    pub fn is_active(&self) -> bool {
        self.destinations.is_some() || self.platforms.is_some() || self.transport_types.is_some()
    }

    /// Compact summary such as `→ Pasing Gl.2 S,U`.
    ///
    /// A single destination or platform is shown by name, several by count.
    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();

        if let Some(destinations) = &self.destinations {
            match destinations.len() {
                1 => parts.push(format!("→ {}", first(destinations))),
                n => parts.push(format!("→ {n}")),
            }
        }

        if let Some(platforms) = &self.platforms {
            match platforms.len() {
                1 => parts.push(format!("Gl.{}", first(platforms))),
                n => parts.push(format!("{n} Gl.")),
            }
        }

        if let Some(types) = &self.transport_types {
            let names: Vec<&str> = types.iter().map(TransportType::short_name).collect();
            parts.push(names.join(","));
        }

        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

fn first(set: &BTreeSet<String>) -> &str {
    set.iter().next().map(String::as_str).unwrap_or_default()
}

fn string_set<I, S>(values: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = values
        .into_iter()
        .map(Into::into)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

fn non_empty_strings<'de, D>(deserializer: D) -> Result<Option<BTreeSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(string_set))
}

/// Unknown transport-type raw values are dropped rather than failing the
/// whole favorite.
fn non_empty_types<'de, D>(deserializer: D) -> Result<Option<BTreeSet<TransportType>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    let set: BTreeSet<TransportType> = raw
        .unwrap_or_default()
        .iter()
        .filter_map(|s| TransportType::from_raw_value(s))
        .collect();
    Ok((!set.is_empty()).then_some(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_axes_are_absent() {
        let f = FavoriteFilterSet::none()
            .with_destinations(["", "  "])
            .with_platforms(Vec::<String>::new())
            .with_transport_types([]);
        assert_eq!(f, FavoriteFilterSet::none());
        assert!(f.destinations().is_none());
        assert!(!f.is_active());
    }

    #[test]
    fn order_independent_equality() {
        let a = FavoriteFilterSet::none()
            .with_destinations(["Pasing", "Laim"])
            .with_transport_types([TransportType::UBahn, TransportType::SBahn]);
        let b = FavoriteFilterSet::none()
            .with_destinations(["Laim", "Pasing", "Laim"])
            .with_transport_types([TransportType::SBahn, TransportType::UBahn]);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_axes_differ() {
        let a = FavoriteFilterSet::none().with_destinations(["1"]);
        let b = FavoriteFilterSet::none().with_platforms(["1"]);
        assert_ne!(a, b);
        assert!(a.is_active());
        assert!(b.is_active());
    }

    #[test]
    fn summary_text() {
        assert_eq!(FavoriteFilterSet::none().summary(), None);

        let f = FavoriteFilterSet::none()
            .with_destinations(["Pasing"])
            .with_platforms(["2"])
            .with_transport_types([TransportType::SBahn, TransportType::UBahn]);
        assert_eq!(f.summary().as_deref(), Some("→ Pasing Gl.2 S,U"));

        let f = FavoriteFilterSet::none()
            .with_destinations(["Pasing", "Laim"])
            .with_platforms(["1", "2", "3"]);
        assert_eq!(f.summary().as_deref(), Some("→ 2 3 Gl."));
    }

    #[test]
    fn deserialize_normalizes_empty_and_unknown() {
        let json = r#"{"destinations":[],"platforms":["1"],"transport_types":["Monorail"]}"#;
        let f: FavoriteFilterSet = serde_json::from_str(json).unwrap();
        assert_eq!(f, FavoriteFilterSet::none().with_platforms(["1"]));

        let f: FavoriteFilterSet = serde_json::from_str("{}").unwrap();
        assert_eq!(f, FavoriteFilterSet::none());

        let json = r#"{"destinations":null}"#;
        let f: FavoriteFilterSet = serde_json::from_str(json).unwrap();
        assert_eq!(f, FavoriteFilterSet::none());
    }

    #[test]
    fn serde_roundtrip() {
        let f = FavoriteFilterSet::none()
            .with_destinations(["Ostbahnhof"])
            .with_transport_types([TransportType::SBahn]);
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("platforms"));
        let back: FavoriteFilterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Construction order never affects equality.
        #[test]
        fn permutation_invariant(mut terms in proptest::collection::vec("[a-z]{1,6}", 0..6)) {
            let a = FavoriteFilterSet::none().with_destinations(terms.clone());
            terms.reverse();
            let b = FavoriteFilterSet::none().with_destinations(terms);
            prop_assert_eq!(a, b);
        }

        /// An axis is absent exactly when no non-blank term was given.
        #[test]
        fn absent_iff_no_terms(terms in proptest::collection::vec("[a-z ]{0,4}", 0..4)) {
            let expected_active = terms.iter().any(|t| !t.trim().is_empty());
            let f = FavoriteFilterSet::none().with_platforms(terms);
            prop_assert_eq!(f.is_active(), expected_active);
        }
    }
}
