//! Application state for the web layer.

use std::sync::Arc;

use crate::display::TimeFormatter;
use crate::preview::DeparturePreviewCache;
use crate::provider::DepartureProvider;
use crate::store::FavoriteStore;
use crate::sync::SyncBridge;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// The favorites store
    pub store: Arc<FavoriteStore>,

    /// Departure and station source
    pub provider: Arc<dyn DepartureProvider>,

    /// Per-favorite departure previews
    pub previews: DeparturePreviewCache,

    /// Departure time formatting
    pub formatter: Arc<TimeFormatter>,

    /// Sync with the paired device, when one is configured
    pub bridge: Option<Arc<SyncBridge>>,
}

impl AppState {
    /// Create a new app state without a paired device.
    pub fn new(
        store: Arc<FavoriteStore>,
        provider: Arc<dyn DepartureProvider>,
        previews: DeparturePreviewCache,
        formatter: TimeFormatter,
    ) -> Self {
        Self {
            store,
            provider,
            previews,
            formatter: Arc::new(formatter),
            bridge: None,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<SyncBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }
}
