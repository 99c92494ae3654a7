use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::{game_store::couchdb::error::CouchDaoError, models::GameEntity};

pub const GAME_PREFIX: &str = "game::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Subset of `GET /{db}` used to anchor a changes feed.
#[derive(Debug, Deserialize)]
pub struct DatabaseInfo {
    pub update_seq: Value,
}

/// One line of a continuous `_changes` feed.
///
/// The closing `{"last_seq": ...}` line carries no `id`.
#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub game: GameEntity,
}

impl From<(GameEntity, Option<String>)> for CouchGameDocument {
    fn from((game, rev): (GameEntity, Option<String>)) -> Self {
        Self {
            id: game_doc_id(&game.id),
            rev,
            game,
        }
    }
}

impl TryFrom<CouchGameDocument> for GameEntity {
    type Error = CouchDaoError;

    fn try_from(doc: CouchGameDocument) -> Result<Self, Self::Error> {
        let code = extract_code(&doc.id)?;
        if code != doc.game.id {
            return Err(CouchDaoError::InvalidDocId {
                doc_id: doc.id,
                kind: "key does not match game code",
            });
        }
        Ok(doc.game)
    }
}

impl ChangeRow {
    /// Decode the row into the document state it announces.
    ///
    /// Returns `Ok(None)` for lines that do not describe `doc_id`.
    pub fn into_state(self, doc_id: &str) -> Result<Option<Option<GameEntity>>, CouchDaoError> {
        if self.id.as_deref() != Some(doc_id) {
            return Ok(None);
        }
        if self.deleted {
            return Ok(Some(None));
        }
        let Some(doc) = self.doc else {
            return Ok(None);
        };
        let parsed: CouchGameDocument =
            serde_json::from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                path: doc_id.to_string(),
                source,
            })?;
        GameEntity::try_from(parsed).map(|game| Some(Some(game)))
    }
}

pub fn game_doc_id(code: &str) -> String {
    format!("{}{}", GAME_PREFIX, code)
}

pub fn extract_code(doc_id: &str) -> Result<&str, CouchDaoError> {
    doc_id
        .strip_prefix(GAME_PREFIX)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing game prefix",
        })
}
