//! EFA HTTP client.
//!
//! Queries the MVV EFA departure monitor and stop finder in `rapidJSON`
//! output format.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{Coordinate, DepartureEvent, IdNormalizer, StationLocation};

use super::DepartureProvider;
use super::convert::{convert_departures, convert_nearby, convert_stop_finder, coord_query};
use super::error::FetchError;
use super::types::{DepartureResponse, StopFinderResponse};

/// Default base URL for the EFA endpoints.
pub const DEFAULT_BASE_URL: &str = "https://def-efa-mvv02.defas-fgi.de/gullivr_ios";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default number of departures requested per board.
const DEFAULT_DEPARTURE_LIMIT: u32 = 40;

const DEPARTURE_MONITOR: &str = "XML_DM_REQUEST";
const STOP_FINDER: &str = "XML_STOPFINDER_REQUEST";
const API_VERSION: &str = "10.6.20.22";

/// Parameters every request carries.
const COMMON_PARAMS: [(&str, &str); 9] = [
    ("excludedMeans", "checkbox"),
    ("coordListOutputFormat", "STRING"),
    ("coordOutputFormat", "WGS84[DD.ddddd]"),
    ("locationServerActive", "1"),
    ("stateless", "1"),
    ("serverInfo", "1"),
    ("language", "de"),
    ("outputFormat", "rapidJSON"),
    ("version", API_VERSION),
];

/// Configuration for the EFA client.
#[derive(Debug, Clone)]
pub struct EfaConfig {
    /// Base URL, without the endpoint name
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Departures requested per board
    pub departure_limit: u32,
    /// Rule used to key returned stations
    pub normalizer: IdNormalizer,
}

impl EfaConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_departure_limit(mut self, limit: u32) -> Self {
        self.departure_limit = limit;
        self
    }

    pub fn with_normalizer(mut self, normalizer: IdNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }
}

impl Default for EfaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            departure_limit: DEFAULT_DEPARTURE_LIMIT,
            normalizer: IdNormalizer::default(),
        }
    }
}

/// EFA API client.
///
/// Uses a semaphore to limit concurrent requests.
#[derive(Debug, Clone)]
pub struct EfaClient {
    http: reqwest::Client,
    base_url: String,
    departure_limit: u32,
    normalizer: IdNormalizer,
    semaphore: Arc<Semaphore>,
}

impl EfaClient {
    pub fn new(config: EfaConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            departure_limit: config.departure_limit,
            normalizer: config.normalizer,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// GET an endpoint with the common parameters plus `params`.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::InvalidRequest("client shut down".to_string()))?;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http
            .get(&url)
            .query(&COMMON_PARAMS)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Json {
            message: e.to_string(),
        })
    }

    /// Resolve a GPS coordinate to the provider's own coordinate id.
    async fn resolve_coordinate(
        &self,
        coordinate: &Coordinate,
    ) -> Result<Option<String>, FetchError> {
        let params = [
            ("convertCoord2LocationServer", "1".to_string()),
            ("macro_sf", "gullivr".to_string()),
            ("name_sf", coord_query(coordinate)),
            ("type_sf", "coord".to_string()),
            ("doNotSearchForStops_sf", "1".to_string()),
        ];
        let response: StopFinderResponse = self.get(STOP_FINDER, &params).await?;
        Ok(response.locations.unwrap_or_default().into_iter().next().map(|l| l.id))
    }
}

#[async_trait]
impl DepartureProvider for EfaClient {
    async fn fetch_departures(&self, station_id: &str) -> Result<Vec<DepartureEvent>, FetchError> {
        if station_id.trim().is_empty() {
            return Err(FetchError::InvalidRequest("empty station id".to_string()));
        }

        let params = [
            ("imparedOptionsActive", "1".to_string()),
            ("itOptionsActive", "1".to_string()),
            ("ptOptionsActive", "1".to_string()),
            ("useRealtime", "1".to_string()),
            ("macromobile_gullivr", "true".to_string()),
            ("AllowEarlyDepartures", "true".to_string()),
            ("name_dm", station_id.to_string()),
            ("type_dm", "any".to_string()),
            ("depSearchType", "departurebyline".to_string()),
            ("depType", "stopEvents".to_string()),
            ("canChangeMOT", "0".to_string()),
            ("includeCompleteStopSeq", "1".to_string()),
            ("limit", self.departure_limit.to_string()),
            ("maxTimeLoop", "1".to_string()),
            ("useAllStops", "1".to_string()),
            ("mode", "direct".to_string()),
        ];

        let response: DepartureResponse = self.get(DEPARTURE_MONITOR, &params).await?;
        let events = convert_departures(&response);
        debug!(station_id, count = events.len(), "fetched departures");
        Ok(events)
    }

    /// Two requests: resolve the coordinate, then a proximity search around it.
    async fn fetch_nearby(
        &self,
        coordinate: Coordinate,
    ) -> Result<Vec<StationLocation>, FetchError> {
        let Some(resolved) = self.resolve_coordinate(&coordinate).await? else {
            debug!(lat = coordinate.lat, lon = coordinate.lon, "coordinate did not resolve");
            return Ok(Vec::new());
        };

        let params = [
            ("convertCoord2LocationServer", "1".to_string()),
            ("useProxFootSearch", "1".to_string()),
            ("macro_sf", "gullivr".to_string()),
            ("name_sf", resolved),
            ("type_sf", "any".to_string()),
        ];
        let response: StopFinderResponse = self.get(STOP_FINDER, &params).await?;
        let stations = convert_nearby(&response, &self.normalizer);
        debug!(count = stations.len(), "fetched nearby stops");
        Ok(stations)
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<StationLocation>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let params = [
            ("macro_sf", "gullivr".to_string()),
            ("name_sf", query.to_string()),
            ("type_sf", "any".to_string()),
        ];
        let response: StopFinderResponse = self.get(STOP_FINDER, &params).await?;
        Ok(convert_stop_finder(&response, &self.normalizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builders() {
        let config = EfaConfig::default()
            .with_base_url("http://localhost:9000/efa/")
            .with_departure_limit(10)
            .with_max_concurrent(2);
        assert_eq!(config.departure_limit, 10);
        assert_eq!(config.max_concurrent, 2);

        let client = EfaClient::new(config).unwrap();
        assert_eq!(client.base_url, "http://localhost:9000/efa");
    }

    #[tokio::test]
    async fn empty_queries_short_circuit() {
        let client =
            EfaClient::new(EfaConfig::default().with_base_url("http://127.0.0.1:1")).unwrap();
        assert!(client.search_stations("   ").await.unwrap().is_empty());
        assert!(matches!(
            client.fetch_departures("").await,
            Err(FetchError::InvalidRequest(_))
        ));
    }
}
