use utoipa::OpenApi;

#[derive(OpenApi)]
/// OpenAPI description of the killer party relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::games::create_game,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::games::game_exists,
        crate::routes::games::update_game,
        crate::routes::games::delete_game,
        crate::routes::sse::game_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameSummary,
            crate::dto::game::GameListResponse,
            crate::dto::sse::GameAbsentEvent,
            crate::dto::sse::TransportDisconnectedEvent,
            crate::dao::models::GameEntity,
            crate::dao::models::GamePatchEntity,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game documents keyed by join code"),
        (name = "sse", description = "Per-game realtime streams"),
    )
)]
/// OpenAPI document of the relay.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_game_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/games", "/games/{code}", "/games/{code}/events"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
