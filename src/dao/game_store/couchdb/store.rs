use std::{io, sync::Arc, time::Duration};

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, future::BoxFuture, stream::BoxStream};
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, json};
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tracing::{debug, warn};

use crate::dao::{
    game_store::{GameFeed, GameStore},
    models::{GameEntity, GamePatchEntity, now_millis},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangeRow, CouchGameDocument, DatabaseInfo, END_SUFFIX, GAME_PREFIX,
        game_doc_id,
    },
};

const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Rows of a continuous `_changes` body, one JSON object per line.
fn change_lines<S, E>(body: S) -> BoxStream<'static, Result<String, LinesCodecError>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    FramedRead::new(StreamReader::new(body.map_err(io::Error::other)), LinesCodec::new()).boxed()
}

/// Outcome of a conditional write.
enum Written {
    Stored,
    Conflict,
}

/// [`GameStore`] backed by a CouchDB database, one document per game.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    heartbeat: Duration,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            heartbeat: config.heartbeat,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another instance created it in the meantime.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn database_info(&self) -> CouchResult<DatabaseInfo> {
        let url = self.database_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            });
        }

        response
            .json::<DatabaseInfo>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse { path: url, source })
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn load_game(&self, doc_id: &str) -> CouchResult<Option<(GameEntity, Option<String>)>> {
        let Some(doc) = self.get_document::<CouchGameDocument>(doc_id).await? else {
            return Ok(None);
        };
        let rev = doc.rev.clone();
        Ok(Some((GameEntity::try_from(doc)?, rev)))
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<Written>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(Written::Conflict),
            status if status.is_success() => Ok(Written::Stored),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<Written> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(Written::Conflict),
            status if status.is_success() => Ok(Written::Stored),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: row.id,
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Open a continuous `_changes` feed restricted to one document.
    async fn open_changes(&self, doc_id: &str, since: &Value) -> CouchResult<reqwest::Response> {
        const CHANGES: &str = "_changes";
        let since = match since {
            Value::String(seq) => seq.clone(),
            other => other.to_string(),
        };
        let query = [
            ("feed", "continuous".to_string()),
            ("filter", "_doc_ids".to_string()),
            ("include_docs", "true".to_string()),
            ("since", since),
            ("heartbeat", self.heartbeat.as_millis().to_string()),
        ];

        let response = self
            .request(Method::POST, CHANGES)
            .query(&query)
            .json(&json!({ "doc_ids": [doc_id] }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            })
        }
    }
}

impl GameStore for CouchGameStore {
    fn create_game(&self, mut game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&game.id);
            game.revision = 0;
            game.stamp(now_millis());
            let doc = CouchGameDocument::from((game.clone(), None));
            match store.put_document(&doc_id, &doc).await? {
                Written::Stored => Ok(game),
                Written::Conflict => Err(StorageError::conflict(game.id)),
            }
        })
    }

    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&id);
            let loaded = store.load_game(&doc_id).await?;
            Ok(loaded.map(|(game, _)| game))
        })
    }

    fn update_game(
        &self,
        id: String,
        patch: GamePatchEntity,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&id);
            for attempt in 1..=MAX_WRITE_ATTEMPTS {
                let Some((mut game, rev)) = store.load_game(&doc_id).await? else {
                    return Err(StorageError::not_found(id));
                };
                game.apply_patch(patch.clone(), now_millis());
                let doc = CouchGameDocument::from((game.clone(), rev));
                match store.put_document(&doc_id, &doc).await? {
                    Written::Stored => return Ok(game),
                    Written::Conflict => {
                        debug!(game = %id, attempt, "revision conflict while updating game; retrying");
                    }
                }
            }
            Err(CouchDaoError::UpdateContention {
                doc_id,
                attempts: MAX_WRITE_ATTEMPTS,
            }
            .into())
        })
    }

    fn delete_game(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&id);
            for attempt in 1..=MAX_WRITE_ATTEMPTS {
                let Some(doc) = store.get_document::<CouchGameDocument>(&doc_id).await? else {
                    return Ok(false);
                };
                let Some(rev) = doc.rev else {
                    return Ok(false);
                };
                match store.delete_document(&doc_id, &rev).await? {
                    Written::Stored => return Ok(true),
                    Written::Conflict => {
                        debug!(game = %id, attempt, "revision conflict while deleting game; retrying");
                    }
                }
            }
            Err(CouchDaoError::UpdateContention {
                doc_id,
                attempts: MAX_WRITE_ATTEMPTS,
            }
            .into())
        })
    }

    fn game_exists(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = game_doc_id(&id);
            let response = store
                .request(Method::HEAD, &doc_id)
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: doc_id.clone(),
                    source,
                })?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(false),
                status if status.is_success() => Ok(true),
                other => Err(CouchDaoError::RequestStatus {
                    path: doc_id,
                    status: other,
                }
                .into()),
            }
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchGameDocument>(GAME_PREFIX)
                .await?;
            let mut games = Vec::with_capacity(docs.len());
            for doc in docs {
                match GameEntity::try_from(doc) {
                    Ok(game) => games.push(game),
                    Err(err) => warn!(error = %err, "skipping malformed game document"),
                }
            }
            Ok(games)
        })
    }

    fn watch_game(&self, id: String) -> GameFeed {
        let store = self.clone();
        Box::pin(stream! {
            let doc_id = game_doc_id(&id);

            // Anchor the feed before reading so no write falls between the two.
            let since = match store.database_info().await {
                Ok(info) => info.update_seq,
                Err(err) => {
                    yield Err(StorageError::from(err));
                    return;
                }
            };
            match store.load_game(&doc_id).await {
                Ok(current) => yield Ok(current.map(|(game, _)| game)),
                Err(err) => {
                    yield Err(StorageError::from(err));
                    return;
                }
            }

            let response = match store.open_changes(&doc_id, &since).await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(StorageError::from(err));
                    return;
                }
            };

            let mut feed = change_lines(response.bytes_stream());
            while let Some(line) = feed.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(source) => {
                        yield Err(StorageError::from(CouchDaoError::FeedInterrupted {
                            doc_id: doc_id.clone(),
                            source: Some(source),
                        }));
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let decoded = serde_json::from_str::<ChangeRow>(&line)
                    .map_err(|source| CouchDaoError::DeserializeValue {
                        path: doc_id.clone(),
                        source,
                    })
                    .and_then(|row| row.into_state(&doc_id));
                match decoded {
                    Ok(Some(state)) => yield Ok(state),
                    Ok(None) => {}
                    Err(err) => {
                        yield Err(StorageError::from(err));
                        return;
                    }
                }
            }

            yield Err(StorageError::from(CouchDaoError::FeedInterrupted { doc_id, source: None }));
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.database_info().await?;
            Ok(())
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
