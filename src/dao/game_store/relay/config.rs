use std::time::Duration;

use url::Url;

use super::error::{RelayClientError, RelayResult};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Location of a relay and the timeout applied to its REST calls.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Relay root URL.
    pub base_url: Url,
    /// Applies to REST calls only; the event stream stays open indefinitely.
    pub request_timeout: Duration,
}

impl RelayConfig {
    /// Parse the relay base URL, e.g. `http://localhost:8080`.
    pub fn new(base_url: &str) -> RelayResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|source| RelayClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Build a configuration from `KILLER_PARTY_RELAY_URL`.
    pub fn from_env() -> RelayResult<Self> {
        let base_url = std::env::var("KILLER_PARTY_RELAY_URL").map_err(|_| {
            RelayClientError::MissingEnvVar {
                var: "KILLER_PARTY_RELAY_URL",
            }
        })?;
        Self::new(&base_url)
    }

    /// Resolve a path relative to the relay base URL.
    pub fn endpoint(&self, path: &str) -> RelayResult<Url> {
        self.base_url
            .join(path)
            .map_err(|source| RelayClientError::InvalidUrl {
                url: path.to_string(),
                source,
            })
    }
}
