use eventsource_stream::EventStreamError;
use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for relay client operations.
pub type RelayResult<T> = Result<T, RelayClientError>;

/// Failures that can occur while talking to the relay.
#[derive(Debug, Error)]
pub enum RelayClientError {
    /// Required environment variable is missing.
    #[error("missing relay environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The relay URL or a derived endpoint is malformed.
    #[error("invalid relay URL `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// Building the HTTP client failed.
    #[error("failed to build relay client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or timed out.
    #[error("failed to send relay request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The relay answered with an unexpected status code.
    #[error("unexpected relay response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed.
    #[error("failed to decode relay response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// An event payload could not be parsed.
    #[error("failed to decode relay event `{event}`")]
    DecodeEvent {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    /// The relay lost its own backend connection.
    #[error("relay reported a transport disconnect for `{code}`")]
    UpstreamDisconnected { code: String },
    /// The event stream ended or broke off.
    #[error("relay event stream for `{code}` was interrupted")]
    StreamInterrupted {
        code: String,
        #[source]
        source: Option<EventStreamError<reqwest::Error>>,
    },
}
