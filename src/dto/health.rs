use serde::Serialize;
use utoipa::ToSchema;

/// Response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Name of the configured game store backend.
    pub backend: String,
}

impl HealthResponse {
    /// The store backend is connected.
    pub fn ok(backend: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            backend: backend.into(),
        }
    }

    /// The store backend is unreachable; game routes answer 503.
    pub fn degraded(backend: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            backend: backend.into(),
        }
    }
}
