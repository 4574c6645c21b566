use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use commuter::config::AppConfig;
use commuter::display::TimeFormatter;
use commuter::domain::IdNormalizer;
use commuter::preview::{DeparturePreviewCache, PreviewConfig};
use commuter::provider::{DepartureProvider, EfaClient, EfaConfig};
use commuter::store::{FavoriteStore, JsonFilePersistence};
use commuter::sync::{HttpPeerChannel, HttpPeerConfig, SyncBridge, SyncConfig};
use commuter::web::{AppState, create_router};

/// Favorites whose previews are fetched at startup.
const WARM_PREVIEWS: usize = 10;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("commuter=info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;
    let normalizer = IdNormalizer::new(config.normalization);

    // Favorites
    let persistence = JsonFilePersistence::new(&config.data_file);
    let (store, changes) = FavoriteStore::open(persistence, normalizer);
    let store = Arc::new(store);
    info!(
        path = %config.data_file.display(),
        favorites = store.all().len(),
        "loaded favorites"
    );

    // Departures
    let efa = EfaClient::new(
        EfaConfig::default()
            .with_base_url(config.efa_base_url.as_str())
            .with_normalizer(normalizer),
    )
    .map_err(|e| format!("failed to create EFA client: {e}"))?;
    let provider: Arc<dyn DepartureProvider> = Arc::new(efa);

    let previews = DeparturePreviewCache::new(
        Arc::clone(&provider),
        &PreviewConfig::default().with_ttl(config.preview_ttl),
    );
    {
        let previews = previews.clone();
        let favorites = store.all();
        tokio::spawn(async move {
            let warmed = previews.warm(&favorites, WARM_PREVIEWS).await;
            info!(warmed, "warmed favorite previews");
        });
    }

    let mut state = AppState::new(
        Arc::clone(&store),
        provider,
        previews,
        TimeFormatter::default(),
    );

    // Sync
    match &config.peer_url {
        Some(peer_url) => {
            let channel = HttpPeerChannel::new(HttpPeerConfig::new(peer_url.as_str()))
                .map_err(|e| format!("failed to create sync channel: {e}"))?;
            let bridge = Arc::new(SyncBridge::new(
                Arc::clone(&store),
                Arc::new(channel),
                SyncConfig::default(),
            ));
            tokio::spawn(Arc::clone(&bridge).run(changes));

            let connecting = Arc::clone(&bridge);
            tokio::spawn(async move { connecting.connect().await });

            info!(peer = %peer_url, "favorites sync enabled");
            state = state.with_bridge(bridge);
        }
        None => {
            // Nothing consumes local changes without a peer.
            drop(changes);
            warn!("no COMMUTER_PEER_URL set, favorites sync disabled");
        }
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.bind))?;
    info!(addr = %config.bind, "commuter listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}
