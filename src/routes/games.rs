use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dao::models::{GameEntity, GamePatchEntity},
    dto::game::{GameListResponse, ListGamesQuery},
    error::AppError,
    services::relay_service,
    state::SharedState,
};

/// Store endpoints: one document per game code.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games).post(create_game))
        .route(
            "/games/{code}",
            get(get_game)
                .head(game_exists)
                .patch(update_game)
                .delete(delete_game),
        )
}

/// Store a new game under its code.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = GameEntity,
    responses(
        (status = 201, description = "Game stored", body = GameEntity),
        (status = 400, description = "Malformed game document"),
        (status = 409, description = "Code already taken"),
        (status = 503, description = "Relay is degraded")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(game)): Valid<Json<GameEntity>>,
) -> Result<(StatusCode, Json<GameEntity>), AppError> {
    let stored = relay_service::create_game(&state, game).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// List stored games, as summaries or full documents.
#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(ListGamesQuery),
    responses((status = 200, description = "Stored games", body = GameListResponse))
)]
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<ListGamesQuery>,
) -> Result<Json<GameListResponse>, AppError> {
    Ok(Json(relay_service::list_games(&state, query.view).await?))
}

/// Read the current document of a game.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "games",
    params(("code" = String, Path, description = "Four character game code")),
    responses(
        (status = 200, description = "Current document", body = GameEntity),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<GameEntity>, AppError> {
    Ok(Json(relay_service::get_game(&state, &code).await?))
}

/// Check whether a game is stored under the code.
#[utoipa::path(
    head,
    path = "/games/{code}",
    tag = "games",
    params(("code" = String, Path, description = "Four character game code")),
    responses(
        (status = 200, description = "Game exists"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn game_exists(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    if relay_service::game_exists(&state, &code).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Replace the mentioned fields of a game; the last write wins.
#[utoipa::path(
    patch,
    path = "/games/{code}",
    tag = "games",
    params(("code" = String, Path, description = "Four character game code")),
    request_body = GamePatchEntity,
    responses(
        (status = 200, description = "Merged document", body = GameEntity),
        (status = 400, description = "Empty or malformed patch"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn update_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(patch)): Valid<Json<GamePatchEntity>>,
) -> Result<Json<GameEntity>, AppError> {
    Ok(Json(relay_service::update_game(&state, &code, patch).await?))
}

/// Remove a game.
#[utoipa::path(
    delete,
    path = "/games/{code}",
    tag = "games",
    params(("code" = String, Path, description = "Four character game code")),
    responses(
        (status = 204, description = "Game removed"),
        (status = 404, description = "Unknown game")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    if relay_service::delete_game(&state, &code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("game `{code}`")))
    }
}
