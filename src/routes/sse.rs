use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

/// Push the game document to the client on every committed write.
#[utoipa::path(
    get,
    path = "/games/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Four character game code")),
    responses(
        (status = 200, description = "game.snapshot / game.absent / transport.disconnected events", content_type = "text/event-stream", body = String),
        (status = 400, description = "Malformed game code"),
        (status = 503, description = "Relay is degraded")
    )
)]
pub async fn game_events(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (code, feed) = sse_service::subscribe_game(&state, &code).await?;
    info!(code = %code, "new game SSE connection");
    Ok(sse_service::to_sse_stream(code, feed))
}

/// Configure the realtime endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{code}/events", get(game_events))
}
