//! Mission content: the pluggable provider contract, the built-in catalog
//! and the fallback padding applied when a provider comes up short.

mod catalog;
#[cfg(feature = "gemini")]
mod gemini;

use std::error::Error;

use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

use crate::state::game::{Difficulty, Mission, MissionCategory};

pub use catalog::MissionCatalog;
#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiMissionProvider};

/// Failure of the external content provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No credentials or no provider configured.
    #[error("content provider is not configured")]
    NotConfigured,
    /// The provider could not be reached.
    #[error("content provider request failed: {message}")]
    Request {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The provider answered with an error status.
    #[error("content provider answered with status {status}")]
    Status { status: u16 },
    /// The provider answered with something that is not usable content.
    #[error("content provider returned an unusable payload: {reason}")]
    Malformed { reason: String },
}

/// Narrow request/response contract of the generative content service.
pub trait MissionProvider: Send + Sync {
    /// Ask for `count` missions suited to `context` around `difficulty`.
    fn generate_missions(
        &self,
        count: usize,
        context: String,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<Vec<Mission>, ProviderError>>;

    /// Turn a photo (data URI) into a stylized agent portrait description.
    fn generate_portrait(&self, _image: String) -> BoxFuture<'static, Result<String, ProviderError>> {
        Box::pin(async { Err(ProviderError::NotConfigured) })
    }
}

/// Provider used when no generative service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

impl MissionProvider for DisabledProvider {
    fn generate_missions(
        &self,
        _count: usize,
        _context: String,
        _difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<Vec<Mission>, ProviderError>> {
        Box::pin(async { Err(ProviderError::NotConfigured) })
    }
}

/// Mission as returned by a generative provider, before sanitizing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMission {
    /// Mission text.
    pub description: String,
    /// Requested tier, clamped on sanitize.
    #[serde(default)]
    pub difficulty: i64,
    /// Category label; unknown labels become Social.
    #[serde(default)]
    pub category: String,
}

impl RawMission {
    /// Clamp difficulty to 1..=3, map unknown categories to Social and drop
    /// blank descriptions.
    pub fn sanitize(self, id: String) -> Option<Mission> {
        let description = self.description.trim();
        if description.is_empty() {
            return None;
        }
        Some(Mission {
            id,
            description: description.to_string(),
            difficulty: Difficulty::clamped(self.difficulty),
            category: MissionCategory::from_label(&self.category),
        })
    }
}
