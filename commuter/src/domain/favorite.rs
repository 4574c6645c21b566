//! Favorites.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::filters::FavoriteFilterSet;
use super::identity::IdNormalizer;
use super::station::StationLocation;

/// Opaque, globally unique favorite id. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteId(Uuid);

impl FavoriteId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse the hyphenated textual form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for FavoriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The key two favorites are deduplicated and toggled by.
///
/// Deliberately excludes the opaque id: two favorites with different ids but
/// the same station and filters are the same logical favorite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FavoriteIdentity<'a> {
    pub normalized_id: &'a str,
    pub filters: &'a FavoriteFilterSet,
}

/// A saved station, optionally narrowed by filters.
///
/// Replaced rather than edited: changing filters means removing this
/// favorite and adding a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    id: FavoriteId,
    location: StationLocation,
    #[serde(default)]
    filters: FavoriteFilterSet,
    created_at: DateTime<Utc>,
}

impl Favorite {
    /// Create a new favorite with a fresh id.
    ///
    /// Only the favorite store should call this; everything else goes
    /// through `FavoriteStore::add`.
    pub(crate) fn create(location: StationLocation, filters: FavoriteFilterSet) -> Self {
        Self {
            id: FavoriteId::generate(),
            location,
            filters,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> FavoriteId {
        self.id
    }

    pub fn location(&self) -> &StationLocation {
        &self.location
    }

    pub fn filters(&self) -> &FavoriteFilterSet {
        &self.filters
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn normalized_id(&self) -> &str {
        self.location.normalized_id()
    }

    pub fn identity(&self) -> FavoriteIdentity<'_> {
        FavoriteIdentity {
            normalized_id: self.location.normalized_id(),
            filters: &self.filters,
        }
    }

    /// Whether this favorite is the logical favorite `(normalized_id, filters)`.
    pub fn matches_identity(&self, normalized_id: &str, filters: &FavoriteFilterSet) -> bool {
        self.location.normalized_id() == normalized_id && &self.filters == filters
    }

    /// The same favorite with its location re-keyed by `normalizer`.
    pub fn renormalized(&self, normalizer: &IdNormalizer) -> Self {
        Self {
            location: self.location.renormalized(normalizer),
            ..self.clone()
        }
    }

    pub fn display_name(&self) -> &str {
        self.location.display_name()
    }

    /// Station name followed by the filter summary, if any.
    pub fn short_display_name(&self) -> String {
        match self.filters.summary() {
            Some(summary) => format!("{} {}", self.display_name(), summary),
            None => self.display_name().to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a favorite with a chosen creation time for deterministic tests.
    pub fn favorite_at(
        location: StationLocation,
        filters: FavoriteFilterSet,
        created_at: DateTime<Utc>,
    ) -> Favorite {
        Favorite {
            id: FavoriteId::generate(),
            location,
            filters,
            created_at,
        }
    }
}
