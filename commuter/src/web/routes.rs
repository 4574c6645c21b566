//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use tracing::{debug, error, warn};

use crate::board::{BoardOptions, filtered_and_sorted};
use crate::domain::{Coordinate, DepartureEvent, FavoriteFilterSet, FavoriteId, StationLocation};
use crate::filter::filter_departures;
use crate::ordering::{FavoriteSortOption, sort_favorites, sort_locations_by_distance};
use crate::preview::PreviewKey;
use crate::provider::FetchError;
use crate::store::StoreError;
use crate::sync::SyncMessage;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stations/search", get(search_stations))
        .route("/api/stations/nearby", get(nearby_stations))
        .route("/api/departures/:station_id", get(departures))
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route("/api/favorites/:id", delete(remove_favorite))
        .route("/api/favorites/:id/preview", get(favorite_preview))
        .route("/api/sync", post(sync_inbound))
        .route("/api/sync/foreground", post(sync_foreground))
        .with_state(state)
}

/// Health check endpoint. Also the sync peer's activation probe.
async fn health() -> &'static str {
    "ok"
}

/// Search stations by name.
async fn search_stations(
    State(state): State<AppState>,
    Query(req): Query<StationSearchRequest>,
) -> Result<Json<StationSearchResponse>, AppError> {
    let stations = state.provider.search_stations(&req.q).await?;
    let stations = stations
        .iter()
        .map(|s| StationResult::from_location(s, None))
        .collect();
    Ok(Json(StationSearchResponse { stations }))
}

/// Stops around a coordinate, nearest first.
async fn nearby_stations(
    State(state): State<AppState>,
    Query(req): Query<NearbyRequest>,
) -> Result<Json<StationSearchResponse>, AppError> {
    let coordinate = Coordinate::from_lat_lon_slice(&[req.lat, req.lon]).ok_or_else(|| {
        AppError::BadRequest {
            message: "lat and lon must be finite".to_string(),
        }
    })?;

    let mut stations = state.provider.fetch_nearby(coordinate).await?;
    sort_locations_by_distance(&mut stations, Some(&coordinate));

    let stations = stations
        .iter()
        .map(|s| StationResult::from_location(s, Some(&coordinate)))
        .collect();
    Ok(Json(StationSearchResponse { stations }))
}

/// A station's live board, optionally narrowed by filters.
async fn departures(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<BoardResponse>, AppError> {
    let station_id = station_id.trim().to_string();
    if station_id.is_empty() {
        return Err(AppError::BadRequest {
            message: "station id is required".to_string(),
        });
    }
    let filters = query.to_filters().map_err(|t| AppError::BadRequest {
        message: format!("unknown transport type: {t}"),
    })?;

    let location = StationLocation::new(station_id.as_str(), state.store.normalizer());
    let full_board =
        filtered_and_sorted(state.provider.as_ref(), &station_id, &FavoriteFilterSet::none())
            .await?;
    let options = BoardOptions::from_events(&full_board);

    let board = if filters.is_active() {
        filter_departures(&full_board, &filters)
    } else {
        full_board
    };

    Ok(Json(BoardResponse {
        favorite_active: state.store.contains(location.normalized_id(), &filters),
        station_id,
        normalized_id: location.normalized_id().to_string(),
        departures: rows(&state, &board),
        platforms: options.platforms,
        destinations: options.destinations,
    }))
}

fn rows(state: &AppState, events: &[DepartureEvent]) -> Vec<DepartureRow> {
    let now = Utc::now();
    events
        .iter()
        .map(|e| DepartureRow::new(e, state.formatter.display(e, now)))
        .collect()
}

/// All favorites, sorted by name or by distance from a reference point.
async fn list_favorites(
    State(state): State<AppState>,
    Query(req): Query<FavoritesRequest>,
) -> Result<Json<FavoritesResponse>, AppError> {
    let option = match &req.sort {
        Some(sort) => sort
            .parse::<FavoriteSortOption>()
            .map_err(|message| AppError::BadRequest { message })?,
        None => FavoriteSortOption::default(),
    };
    let reference = req.reference();

    let snapshot = state.store.snapshot();
    let mut favorites = snapshot.favorites.to_vec();
    sort_favorites(&mut favorites, option, reference.as_ref());

    Ok(Json(FavoritesResponse {
        favorites: favorites
            .iter()
            .map(|f| FavoriteResult::from_favorite(f, reference.as_ref()))
            .collect(),
        persist_error: snapshot.persist_error.map(|e| e.to_string()),
    }))
}

/// Add the favorite for a station and filter set, or remove it if present.
async fn toggle_favorite(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    if req.station.id.trim().is_empty() {
        return Err(AppError::BadRequest {
            message: "station id is required".to_string(),
        });
    }

    let store = Arc::clone(&state.store);
    let outcome = write_blocking(move || {
        let location = req.station.to_location(store.normalizer());
        Ok(store.toggle(location, req.filters)?)
    })
    .await?;

    Ok(Json(ToggleResponse {
        added: outcome.is_added(),
        favorite: FavoriteResult::from_favorite(outcome.favorite(), None),
    }))
}

/// Remove a favorite. Removing an absent id succeeds.
async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_favorite_id(&id)?;
    let store = Arc::clone(&state.store);
    if write_blocking(move || Ok(store.remove(id)?)).await?.is_none() {
        debug!(%id, "favorite already absent");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Run a favorites write on the blocking pool.
///
/// Store mutations save synchronously while holding the writer lock, so
/// they stay off the async workers.
async fn write_blocking<T, F>(write: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(write)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("favorites write task failed: {e}"),
        })?
}

/// The next few departures matching a favorite.
///
/// Returns at once; `is_loading` is set while a refresh runs in the
/// background.
async fn favorite_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, AppError> {
    let id = parse_favorite_id(&id)?;
    let favorite = state.store.get(id).ok_or_else(|| AppError::NotFound {
        message: format!("favorite {id} not found"),
    })?;

    let snapshot = state.previews.get(&PreviewKey::for_favorite(&favorite)).await;
    Ok(Json(PreviewResponse {
        favorite_id: id.to_string(),
        is_loading: snapshot.is_loading,
        departures: rows(&state, &snapshot.events),
    }))
}

fn parse_favorite_id(raw: &str) -> Result<FavoriteId, AppError> {
    FavoriteId::parse(raw.trim()).map_err(|_| AppError::BadRequest {
        message: format!("invalid favorite id: {raw}"),
    })
}

/// A message from the paired device. The response body is our reply, or
/// `null`.
async fn sync_inbound(
    State(state): State<AppState>,
    Json(message): Json<SyncMessage>,
) -> Result<Json<Option<SyncMessage>>, AppError> {
    let bridge = Arc::clone(state.bridge.as_ref().ok_or_else(sync_not_configured)?);
    let reply = write_blocking(move || Ok(bridge.receive(message))).await?;
    Ok(Json(reply))
}

/// The app came to the foreground: connect, or pull if already connected.
async fn sync_foreground(State(state): State<AppState>) -> Json<ForegroundResponse> {
    let sync_state = match &state.bridge {
        Some(bridge) => {
            bridge.on_foreground().await;
            Some(bridge.state())
        }
        None => None,
    };
    Json(ForegroundResponse { state: sync_state })
}

fn sync_not_configured() -> AppError {
    AppError::NotFound {
        message: "no sync peer configured".to_string(),
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    /// The transit provider failed
    Upstream { message: String },
    Internal { message: String },
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidRequest(message) => AppError::BadRequest { message },
            _ => AppError::Upstream {
                message: e.to_string(),
            },
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
