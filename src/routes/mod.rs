use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Game document endpoints.
pub mod games;
/// Healthcheck endpoint.
pub mod health;
/// Per-game event streams.
pub mod sse;

/// Compose all route trees with the shared state and the Swagger UI at `/docs`.
pub fn router(state: SharedState) -> Router<()> {
    let docs: Router<SharedState> = SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into();

    health::router()
        .merge(games::router())
        .merge(sse::router())
        .merge(docs)
        .with_state(state)
}
