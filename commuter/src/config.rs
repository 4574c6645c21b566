//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{InvalidNormalizationRule, NormalizationRule};
use crate::preview::PreviewConfig;
use crate::provider::DEFAULT_BASE_URL;
use crate::store::DEFAULT_DATA_FILE;

const BIND: &str = "COMMUTER_BIND";
const DATA_FILE: &str = "COMMUTER_DATA_FILE";
const EFA_BASE_URL: &str = "COMMUTER_EFA_BASE_URL";
const PEER_URL: &str = "COMMUTER_PEER_URL";
const NORMALIZATION: &str = "COMMUTER_NORMALIZATION";
const PREVIEW_TTL_SECS: &str = "COMMUTER_PREVIEW_TTL_SECS";

/// Errors reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid socket address {value:?}")]
    InvalidBind { var: &'static str, value: String },

    #[error("{var}: {source}")]
    InvalidNormalization {
        var: &'static str,
        source: InvalidNormalizationRule,
    },

    #[error("{var}: expected a positive number of seconds, got {value:?}")]
    InvalidDuration { var: &'static str, value: String },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP API listens on
    pub bind: SocketAddr,

    /// Favorites file
    pub data_file: PathBuf,

    /// EFA endpoint base URL
    pub efa_base_url: String,

    /// Paired device, if any
    pub peer_url: Option<String>,

    /// Station id normalization rule
    pub normalization: NormalizationRule,

    /// Preview freshness window
    pub preview_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            efa_base_url: DEFAULT_BASE_URL.to_string(),
            peer_url: None,
            normalization: NormalizationRule::default(),
            preview_ttl: PreviewConfig::default().ttl,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or blank variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(value) = get(BIND) {
            config.bind = value
                .parse()
                .map_err(|_| ConfigError::InvalidBind { var: BIND, value })?;
        }
        if let Some(value) = get(DATA_FILE) {
            config.data_file = PathBuf::from(value);
        }
        if let Some(value) = get(EFA_BASE_URL) {
            config.efa_base_url = value;
        }
        config.peer_url = get(PEER_URL);
        if let Some(value) = get(NORMALIZATION) {
            config.normalization = value
                .parse()
                .map_err(|source| ConfigError::InvalidNormalization {
                    var: NORMALIZATION,
                    source,
                })?;
        }
        if let Some(value) = get(PREVIEW_TTL_SECS) {
            let secs = value
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidDuration {
                    var: PREVIEW_TTL_SECS,
                    value,
                })?;
            config.preview_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.data_file, PathBuf::from("favorites.json"));
        assert_eq!(config.efa_base_url, DEFAULT_BASE_URL);
        assert!(config.peer_url.is_none());
        assert_eq!(config.normalization, NormalizationRule::default());
        assert_eq!(config.preview_ttl, Duration::from_secs(300));
    }

    #[test]
    fn reads_every_variable() {
        let config = load(&[
            (BIND, "0.0.0.0:8080"),
            (DATA_FILE, "/var/lib/commuter/favorites.json"),
            (EFA_BASE_URL, "http://localhost:9000"),
            (PEER_URL, "http://phone.local:3000"),
            (NORMALIZATION, "strip-last"),
            (PREVIEW_TTL_SECS, "60"),
        ])
        .unwrap();

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.data_file, PathBuf::from("/var/lib/commuter/favorites.json"));
        assert_eq!(config.efa_base_url, "http://localhost:9000");
        assert_eq!(config.peer_url.as_deref(), Some("http://phone.local:3000"));
        assert_eq!(config.normalization, NormalizationRule::StripLastSegment);
        assert_eq!(config.preview_ttl, Duration::from_secs(60));
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = load(&[(PEER_URL, "  "), (BIND, "")]).unwrap();
        assert!(config.peer_url.is_none());
        assert_eq!(config.bind.port(), 3000);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(load(&[(BIND, "nowhere")]), Err(ConfigError::InvalidBind { .. })));
        assert!(matches!(
            load(&[(NORMALIZATION, "prefix:0")]),
            Err(ConfigError::InvalidNormalization { .. })
        ));
        assert!(matches!(
            load(&[(PREVIEW_TTL_SECS, "0")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }
}
