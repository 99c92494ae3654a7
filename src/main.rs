//! Killer party relay: serves a game store over REST and per-game SSE.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use killer_party_sync::{
    config::AppConfig,
    dao::game_store::{GameStore, MemoryGameStore},
    routes,
    services::expiry,
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = install_backend(config).await?;

    tokio::spawn(expiry::run(app_state.clone()));
    let app = build_router(app_state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting relay");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// CouchDB when `COUCH_BASE_URL` is set, the in-process store otherwise.
async fn install_backend(config: AppConfig) -> anyhow::Result<SharedState> {
    #[cfg(feature = "couch-store")]
    if env::var_os("COUCH_BASE_URL").is_some() {
        use killer_party_sync::{
            dao::{
                game_store::couchdb::{CouchConfig, CouchGameStore},
                storage::StorageError,
            },
            services::storage_supervisor,
        };

        let couch = CouchConfig::from_env().context("reading CouchDB settings")?;
        let state = AppState::new(config, "couchdb");
        tokio::spawn(storage_supervisor::run(state.clone(), move || {
            let couch = couch.clone();
            async move {
                let store = CouchGameStore::connect(couch)
                    .await
                    .map_err(StorageError::from)?;
                Ok(Arc::new(store) as Arc<dyn GameStore>)
            }
        }));
        return Ok(state);
    }

    let capacity = config.sse_capacity;
    let state = AppState::new(config, "memory");
    state
        .set_game_store(Arc::new(MemoryGameStore::new(capacity)))
        .await;
    info!("using the in-process game store");
    Ok(state)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
