//! Google Gemini implementation of `AnalysisService`.
//!
//! Sends the photo inline together with a JSON response schema, so the
//! model answers with the ingredients/recipes document directly.
//!
//! The API key is read from `GEMINI_API_KEY` on every call, so a rotated key
//! is picked up without restarting.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, instrument};

use crate::analysis::error::{Result, ServiceError};
use crate::analysis::service::{parse_document, AnalysisService};
use crate::analysis::types::AnalysisResult;

/// Environment variable for the Gemini API key
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default model to use
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Base URL for the Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const ANALYSIS_PROMPT: &str = "\
You are a cooking assistant. Identify every food ingredient visible in this photo. \
For each ingredient give its name, a short description, its main nutrients and its \
calories per 100 g. Then suggest three to five recipes that mainly use these ingredients. \
Each recipe needs a unique id, a name, a short description, a difficulty (easy, medium or hard), \
the preparation time, the full ingredient list with quantities, ordered steps and the \
approximate calories per serving. Answer in Simplified Chinese, except for the id and \
difficulty fields.";

// ============================================================================
// API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: &'static str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Schema of the analysis document, in Gemini's OpenAPI subset.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "ingredients": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "nutrition": { "type": "STRING" },
                        "calories": { "type": "INTEGER" }
                    },
                    "required": ["name", "description"]
                }
            },
            "recipes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "name": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "difficulty": { "type": "STRING", "enum": ["easy", "medium", "hard"] },
                        "prepTime": { "type": "STRING" },
                        "ingredients": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "instructions": { "type": "ARRAY", "items": { "type": "STRING" } },
                        "calories": { "type": "STRING" }
                    },
                    "required": [
                        "id", "name", "description", "difficulty",
                        "prepTime", "ingredients", "instructions"
                    ]
                }
            }
        },
        "required": ["ingredients", "recipes"]
    })
}

/// Gemini-backed analysis service.
pub struct GeminiAnalysisService {
    client: Client,
    model: String,
    base_url: String,
    api_key_env: &'static str,
}

impl GeminiAnalysisService {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            base_url: API_BASE_URL.to_owned(),
            api_key_env: GEMINI_API_KEY_ENV,
        }
    }

    /// Point at a different endpoint, e.g. a proxy.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read the key from another environment variable.
    #[must_use]
    pub fn with_api_key_env(mut self, name: &'static str) -> Self {
        self.api_key_env = name;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<String> {
        env::var(self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ServiceError::Credential(self.api_key_env))
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request(image: &[u8]) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        },
                    },
                    RequestPart::Text {
                        text: ANALYSIS_PROMPT,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: &GeminiResponse) -> Result<String> {
        let parts = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();

        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.trim().is_empty() {
            return Err(ServiceError::Malformed(
                "no content in Gemini response".to_string(),
            ));
        }
        Ok(text)
    }

    fn map_api_error(status: u16, response_text: &str) -> ServiceError {
        let message = serde_json::from_str::<GeminiResponse>(response_text)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| response_text.to_owned(), |e| e.message);
        ServiceError::Transport(format!("Gemini API error ({status}): {message}"))
    }
}

#[async_trait]
impl AnalysisService for GeminiAnalysisService {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, image), fields(model = %self.model, bytes = image.len()))]
    async fn analyze(&self, image: &[u8]) -> Result<AnalysisResult> {
        let api_key = self.api_key()?;
        let request = Self::build_request(image);

        debug!("sending photo to Gemini");

        let response = self
            .client
            .post(self.build_url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &response_text));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&response_text)?;
        if let Some(error) = gemini_response.error {
            return Err(ServiceError::Transport(format!(
                "Gemini API error: {}",
                error.message
            )));
        }

        let text = Self::extract_text(&gemini_response)?;
        let result = parse_document(&text)?;
        debug!(
            ingredients = result.ingredients.len(),
            recipes = result.recipes.len(),
            "Gemini analysis complete"
        );
        Ok(result)
    }
}

impl Debug for GeminiAnalysisService {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiAnalysisService")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key_env", &self.api_key_env)
            .finish_non_exhaustive()
    }
}
