use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Check the installed store and report whether the relay can serve games.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let backend = state.backend();
    match state.require_game_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => return HealthResponse::ok(backend),
            Err(err) => warn!(backend, error = %err, "game store health check failed"),
        },
        Err(_) => warn!(backend, "game store unavailable (degraded mode)"),
    }
    HealthResponse::degraded(backend)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::game_store::MemoryGameStore, state::AppState};

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), "memory");
        assert_eq!(health_status(&state).await.status, "degraded");

        state.set_game_store(Arc::new(MemoryGameStore::default())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.backend, "memory");
    }
}
