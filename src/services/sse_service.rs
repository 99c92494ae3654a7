use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        game_store::GameFeed,
        models::GameEntity,
        storage::StorageError,
    },
    dto::sse::{
        ABSENT_EVENT, DISCONNECTED_EVENT, GameAbsentEvent, SNAPSHOT_EVENT, ServerEvent,
        TransportDisconnectedEvent,
    },
    error::ServiceError,
    services::relay_service::parse_code,
    state::{SharedState, game::GameCode},
};

/// Open the store feed of one game.
pub async fn subscribe_game(
    state: &SharedState,
    raw_code: &str,
) -> Result<(GameCode, GameFeed), ServiceError> {
    let code = parse_code(raw_code)?;
    let store = state.require_game_store().await?;
    let feed = store.watch_game(code.to_string());
    Ok((code, feed))
}

/// `game.snapshot` for a document, `game.absent` otherwise.
pub fn snapshot_event(code: &GameCode, document: Option<&GameEntity>) -> serde_json::Result<ServerEvent> {
    match document {
        Some(game) => ServerEvent::json(Some(SNAPSHOT_EVENT.to_string()), game),
        None => ServerEvent::json(
            Some(ABSENT_EVENT.to_string()),
            &GameAbsentEvent {
                code: code.to_string(),
            },
        ),
    }
}

/// Final `transport.disconnected` event.
pub fn disconnected_event(code: &GameCode, err: &StorageError) -> serde_json::Result<ServerEvent> {
    ServerEvent::json(
        Some(DISCONNECTED_EVENT.to_string()),
        &TransportDisconnectedEvent {
            code: code.to_string(),
            message: err.to_string(),
        },
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Forward a game feed to an SSE response until the client leaves or the
/// feed fails; a failure is reported with a final `transport.disconnected`.
pub fn to_sse_stream(
    code: GameCode,
    mut feed: GameFeed,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                item = feed.next() => {
                    let (payload, last) = match item {
                        Some(Ok(document)) => (snapshot_event(&code, document.as_ref()), false),
                        Some(Err(err)) => {
                            warn!(code = %code, error = %err, "game feed interrupted");
                            (disconnected_event(&code, &err), true)
                        }
                        None => break,
                    };
                    match payload {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                            debug!(code = %code, "game event forwarded");
                        }
                        Err(err) => warn!(code = %code, error = %err, "failed to encode game event"),
                    }
                    if last {
                        break;
                    }
                }
            }
        }
        info!(code = %code, "game SSE stream closed");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_becomes_absent_event() {
        let code = GameCode::parse("AB12").unwrap();
        let event = snapshot_event(&code, None).unwrap();
        assert_eq!(event.event.as_deref(), Some(ABSENT_EVENT));
        assert_eq!(event.data, r#"{"code":"AB12"}"#);
    }

    #[test]
    fn feed_errors_carry_their_message() {
        let code = GameCode::parse("AB12").unwrap();
        let event = disconnected_event(&code, &StorageError::not_found("AB12")).unwrap();
        assert_eq!(event.event.as_deref(), Some(DISCONNECTED_EVENT));
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["code"], "AB12");
        assert!(body["message"].as_str().unwrap().contains("AB12"));
    }
}
