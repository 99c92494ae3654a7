use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::{missions::ProviderError, session::SessionError},
};

/// Errors surfaced by the game lifecycle, channel and client operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// No game is stored under the code.
    #[error("game `{code}` not found")]
    NotFound { code: String },
    /// A game already uses the code.
    #[error("game code `{code}` is already taken")]
    Conflict { code: String },
    /// The player is not part of the game.
    #[error("player `{player}` is not part of game `{code}`")]
    PlayerNotFound { code: String, player: Uuid },
    /// The game left the lobby; joining and starting are closed.
    #[error("game `{code}` has already started")]
    AlreadyStarted { code: String },
    /// Not enough players in the lobby to form a target cycle.
    #[error("at least {required} players are needed to start (got {actual})")]
    InsufficientPlayers { required: usize, actual: usize },
    /// The elimination preconditions do not hold.
    #[error("player `{player}` cannot eliminate right now: {reason}")]
    NotEliminable { player: Uuid, reason: &'static str },
    /// A host-only operation was requested by someone else.
    #[error("player `{player}` is not the host of this game")]
    NotHost { player: Uuid },
    /// The content provider failed or is not configured.
    #[error(transparent)]
    ProviderUnavailable(#[from] ProviderError),
    /// The realtime link to the store was lost.
    #[error("realtime transport disconnected")]
    TransportDisconnected,
    /// The text cannot be read as a game code.
    #[error("invalid game code `{raw}`")]
    InvalidCode { raw: String },
    /// A stored document violates the game model.
    #[error("invalid game document: {reason}")]
    InvalidDocument { reason: String },
    /// The store failed for a reason other than a missing or duplicate key.
    #[error("storage failure")]
    Storage(#[source] StorageError),
    /// The local session could not be persisted.
    #[error("session storage failure")]
    Session(#[from] SessionError),
}

impl From<StorageError> for GameError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => GameError::NotFound { code: id },
            StorageError::Conflict { id } => GameError::Conflict { code: id },
            other => GameError::Storage(other),
        }
    }
}

/// Result alias for game operations.
pub type GameResult<T> = Result<T, GameError>;

/// Errors that can occur in relay service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Relay is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ServiceError::NotFound(format!("game `{id}`")),
            StorageError::Conflict { id } => {
                ServiceError::Conflict(format!("game `{id}` already exists"))
            }
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
