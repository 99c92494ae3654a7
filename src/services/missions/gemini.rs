use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{MissionProvider, ProviderError, RawMission};
use crate::{
    dao::models::now_millis,
    state::game::{Difficulty, Mission},
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const CATEGORIES: &str = "Social, Physical (light), Creative, Logic, Humor, Stealth, Performance";

/// Credentials and model selection for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key.
    pub api_key: String,
    /// Model name, e.g. `gemini-2.5-flash`.
    pub model: String,
    /// API root.
    pub base_url: String,
}

impl GeminiConfig {
    /// Read `GEMINI_API_KEY` and the optional `GEMINI_MODEL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::NotConfigured)?;
        Ok(Self {
            api_key,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into()),
            base_url: DEFAULT_BASE_URL.into(),
        })
    }
}

/// [`MissionProvider`] calling Gemini's `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiMissionProvider {
    client: Client,
    config: Arc<GeminiConfig>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiMissionProvider {
    /// Provider using `config`.
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|source| ProviderError::Request {
                message: "failed to build HTTP client".into(),
                source: Box::new(source),
            })?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    async fn generate(&self, body: Value) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                message: "generateContent".into(),
                source: Box::new(source),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                status: response.status().as_u16(),
            });
        }

        let payload =
            response
                .json::<GenerateResponse>()
                .await
                .map_err(|source| ProviderError::Request {
                    message: "decoding generateContent response".into(),
                    source: Box::new(source),
                })?;
        payload.text().ok_or_else(|| ProviderError::Malformed {
            reason: "empty candidate".into(),
        })
    }
}

fn missions_request(count: usize, context: &str, difficulty: Difficulty) -> Value {
    let instruction = format!(
        "You are a professional game designer for the party game \"Killer Party\". \
         Strict safety rules: no illegal actions or dangerous stunts, nothing involving \
         alcohol or drugs, no sexual content or inappropriate contact, no high-risk \
         physical activity, nothing humiliating or harmful to anyone's reputation. \
         Missions are discreet social-stealth tasks: subtle, funny or creative actions \
         that blend into a party. Requested difficulty: {}/3. Categories: {CATEGORIES}.",
        difficulty.tier()
    );
    let prompt = format!(
        "Generate {count} secret, creative missions. Context: {context}. \
         Each mission is a single sentence starting with an imperative verb."
    );

    json!({
        "systemInstruction": { "parts": [{ "text": instruction }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "description": { "type": "STRING" },
                        "difficulty": { "type": "INTEGER", "description": "1 to 3" },
                        "category": { "type": "STRING", "description": "One of the listed categories" }
                    },
                    "required": ["description", "difficulty", "category"]
                }
            },
            "temperature": 0.9,
            "maxOutputTokens": 2048
        }
    })
}

fn portrait_request(image: &str) -> Result<Value, ProviderError> {
    let (header, data) = image.split_once(',').ok_or_else(|| ProviderError::Malformed {
        reason: "portrait is not a data URI".into(),
    })?;
    let mime = header
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .unwrap_or("image/jpeg");

    Ok(json!({
        "contents": [{
            "parts": [
                { "text": "Transform this photo into a spy/secret agent style image. Make it look professional, mysterious and cinematic. Return the description of the transformed image." },
                { "inlineData": { "mimeType": mime, "data": data } }
            ]
        }],
        "generationConfig": { "temperature": 0.7, "maxOutputTokens": 1024 }
    }))
}

/// Parse the JSON array produced under the response schema.
fn parse_missions(text: &str, stamp: u64) -> Result<Vec<Mission>, ProviderError> {
    let raw: Vec<RawMission> =
        serde_json::from_str(text).map_err(|err| ProviderError::Malformed {
            reason: err.to_string(),
        })?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, mission)| mission.sanitize(format!("ai-{stamp}-{index}")))
        .collect())
}

impl MissionProvider for GeminiMissionProvider {
    fn generate_missions(
        &self,
        count: usize,
        context: String,
        difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<Vec<Mission>, ProviderError>> {
        let provider = self.clone();
        Box::pin(async move {
            debug!(count, difficulty = difficulty.tier(), "requesting generated missions");
            let text = provider
                .generate(missions_request(count, &context, difficulty))
                .await?;
            let missions = parse_missions(&text, now_millis())?;
            info!(count = missions.len(), "generated missions");
            Ok(missions)
        })
    }

    fn generate_portrait(&self, image: String) -> BoxFuture<'static, Result<String, ProviderError>> {
        let provider = self.clone();
        Box::pin(async move {
            let body = portrait_request(&image)?;
            provider.generate(body).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::MissionCategory;

    #[test]
    fn parses_and_sanitizes_generated_missions() {
        let text = r#"[
            {"description": "Swap seats with them", "difficulty": 0, "category": "Stealth"},
            {"description": "  ", "difficulty": 2, "category": "Humor"},
            {"description": "Hum a tune", "difficulty": 5, "category": "singing"}
        ]"#;
        let missions = parse_missions(text, 42).unwrap();
        assert_eq!(missions.len(), 2);
        assert_eq!(missions[0].id, "ai-42-0");
        assert_eq!(missions[0].difficulty, Difficulty::Easy);
        assert_eq!(missions[1].id, "ai-42-2");
        assert_eq!(missions[1].category, MissionCategory::Social);
    }

    #[test]
    fn non_array_payload_is_malformed() {
        assert!(matches!(
            parse_missions("{\"oops\":true}", 1),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn candidate_text_is_concatenated() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "[" }, { "text": "]" }] } }]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("[]"));
    }

    #[test]
    fn portrait_request_extracts_mime_and_payload() {
        let body = portrait_request("data:image/png;base64,QUJD").unwrap();
        let inline = &body["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], "image/png");
        assert_eq!(inline["data"], "QUJD");
        assert!(portrait_request("QUJD").is_err());
    }
}
