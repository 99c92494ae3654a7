use std::sync::Arc;

use async_stream::stream;
use eventsource_stream::{Event, Eventsource};
use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::dao::{
    game_store::{GameFeed, GameStore},
    models::{GameEntity, GamePatchEntity},
    storage::{StorageError, StorageResult},
};

use super::{
    config::RelayConfig,
    error::{RelayClientError, RelayResult},
};

const SNAPSHOT_EVENT: &str = "game.snapshot";
const ABSENT_EVENT: &str = "game.absent";
const DISCONNECTED_EVENT: &str = "transport.disconnected";

/// [`GameStore`] that forwards every call to a relay over HTTP.
#[derive(Clone)]
pub struct RelayGameStore {
    client: Client,
    config: Arc<RelayConfig>,
}

impl RelayGameStore {
    /// Build the HTTP client; no request is sent until the first call.
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RelayClientError::ClientBuilder { source })?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn request(&self, method: Method, path: &str) -> RelayResult<RequestBuilder> {
        let url = self.config.endpoint(path)?;
        Ok(self
            .client
            .request(method, url)
            .timeout(self.config.request_timeout))
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> RelayResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| RelayClientError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn decode<T>(response: Response, path: &str) -> RelayResult<T>
    where
        T: DeserializeOwned,
    {
        response
            .json::<T>()
            .await
            .map_err(|source| RelayClientError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    fn unexpected(path: &str, status: StatusCode) -> StorageError {
        RelayClientError::RequestStatus {
            path: path.to_string(),
            status,
        }
        .into()
    }

    /// Open the relay's event stream for a game.
    async fn open_events(&self, code: &str) -> RelayResult<Response> {
        let path = format!("games/{code}/events");
        let url = self.config.endpoint(&path)?;
        let response = self
            .send(
                self.client
                    .get(url)
                    .header(reqwest::header::ACCEPT, "text/event-stream"),
                &path,
            )
            .await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(RelayClientError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }
}

/// Translate a relay event into a feed item; `None` for events to skip.
fn event_to_state(
    code: &str,
    event: &Event,
) -> Option<Result<Option<GameEntity>, RelayClientError>> {
    match event.event.as_str() {
        SNAPSHOT_EVENT => Some(
            serde_json::from_str::<GameEntity>(&event.data)
                .map(Some)
                .map_err(|source| RelayClientError::DecodeEvent {
                    event: SNAPSHOT_EVENT.to_string(),
                    source,
                }),
        ),
        ABSENT_EVENT => Some(Ok(None)),
        DISCONNECTED_EVENT => Some(Err(RelayClientError::UpstreamDisconnected {
            code: code.to_string(),
        })),
        _ => None,
    }
}

impl GameStore for RelayGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "games";
            let response = store
                .send(store.request(Method::POST, path)?.json(&game), path)
                .await?;
            match response.status() {
                StatusCode::CONFLICT => Err(StorageError::conflict(game.id)),
                status if status.is_success() => Ok(Self::decode(response, path).await?),
                other => Err(Self::unexpected(path, other)),
            }
        })
    }

    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("games/{id}");
            let response = store.send(store.request(Method::GET, &path)?, &path).await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => Ok(Some(Self::decode(response, &path).await?)),
                other => Err(Self::unexpected(&path, other)),
            }
        })
    }

    fn update_game(
        &self,
        id: String,
        patch: GamePatchEntity,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("games/{id}");
            let response = store
                .send(store.request(Method::PATCH, &path)?.json(&patch), &path)
                .await?;
            match response.status() {
                StatusCode::NOT_FOUND => Err(StorageError::not_found(id)),
                status if status.is_success() => Ok(Self::decode(response, &path).await?),
                other => Err(Self::unexpected(&path, other)),
            }
        })
    }

    fn delete_game(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("games/{id}");
            let response = store
                .send(store.request(Method::DELETE, &path)?, &path)
                .await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(false),
                status if status.is_success() => Ok(true),
                other => Err(Self::unexpected(&path, other)),
            }
        })
    }

    fn game_exists(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("games/{id}");
            let response = store.send(store.request(Method::HEAD, &path)?, &path).await?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(false),
                status if status.is_success() => Ok(true),
                other => Err(Self::unexpected(&path, other)),
            }
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "games";
            let response = store
                .send(
                    store
                        .request(Method::GET, path)?
                        .query(&[("view", "full")]),
                    path,
                )
                .await?;
            if !response.status().is_success() {
                return Err(Self::unexpected(path, response.status()));
            }
            Ok(Self::decode(response, path).await?)
        })
    }

    fn watch_game(&self, id: String) -> GameFeed {
        let store = self.clone();
        Box::pin(stream! {
            let response = match store.open_events(&id).await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(StorageError::from(err));
                    return;
                }
            };

            let mut events = Box::pin(response.bytes_stream().eventsource());
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(source) => {
                        yield Err(StorageError::from(RelayClientError::StreamInterrupted {
                            code: id.clone(),
                            source: Some(source),
                        }));
                        return;
                    }
                };
                match event_to_state(&id, &event) {
                    Some(Ok(state)) => yield Ok(state),
                    Some(Err(err)) => {
                        yield Err(StorageError::from(err));
                        return;
                    }
                    None => {}
                }
            }

            yield Err(StorageError::from(RelayClientError::StreamInterrupted {
                code: id,
                source: None,
            }));
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "healthcheck";
            let response = store.send(store.request(Method::GET, path)?, path).await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::unexpected(path, response.status()))
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        // Stateless HTTP: reconnecting is another health check.
        self.health_check()
    }
}
