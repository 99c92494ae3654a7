use serde::Serialize;
use utoipa::ToSchema;

/// Event carrying the full game document.
pub const SNAPSHOT_EVENT: &str = "game.snapshot";
/// Event sent while no document is stored under the code.
pub const ABSENT_EVENT: &str = "game.absent";
/// Event sent when the relay lost its store feed; the stream closes after it.
pub const DISCONNECTED_EVENT: &str = "transport.disconnected";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Payload of `game.absent`.
pub struct GameAbsentEvent {
    /// Code that holds no document.
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Payload of `transport.disconnected`.
pub struct TransportDisconnectedEvent {
    /// Code whose feed ended.
    pub code: String,
    /// Why the feed ended.
    pub message: String,
}
