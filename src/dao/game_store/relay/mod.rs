//! Client-side store speaking to the `killer-party-relay` binary.

mod config;
mod error;
mod store;

pub use config::RelayConfig;
pub use error::{RelayClientError, RelayResult};
pub use store::RelayGameStore;

use crate::dao::storage::StorageError;

impl From<RelayClientError> for StorageError {
    fn from(err: RelayClientError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
