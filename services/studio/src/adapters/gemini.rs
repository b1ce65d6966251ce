//! services/studio/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini content model.
//! It implements the `ContentProvider` port from the `core` crate by calling the
//! `generateContent` REST endpoint with a JSON response schema.

use crate::adapters::sanitize::strip_code_fences;
use crate::config::ApiKey;
use async_trait::async_trait;
use mihrab_core::{
    domain::{CardContent, GenerationResult},
    ports::{classify_provider_failure, ContentProvider, PortError, PortResult},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The provider credential, replaceable at runtime.
pub type CredentialSlot = Arc<RwLock<Option<ApiKey>>>;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// The structured payload the model is asked to produce.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionPayload {
    #[serde(default, alias = "surahName")]
    collection_name: String,
    parts: Vec<CardContent>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentProvider` using the Gemini REST API.
#[derive(Clone)]
pub struct GeminiContentAdapter {
    client: reqwest::Client,
    api_base: String,
    model: String,
    credential: CredentialSlot,
}

impl GeminiContentAdapter {
    /// Creates a new `GeminiContentAdapter`.
    pub fn new(
        client: reqwest::Client,
        api_base: String,
        model: String,
        credential: CredentialSlot,
    ) -> Self {
        Self {
            client,
            api_base,
            model,
            credential,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

/// Builds the instruction sent for a topic.
pub fn build_prompt(topic: &str) -> String {
    format!(
        "Generate structured Islamic infographic content for \"{topic}\".\n\
         Provide 6 distinct parts, one per image.\n\
         Each part must have:\n\
         1. title: a short label (e.g. \"The Story of...\", \"Signs of Creation\").\n\
         2. hook: a catchy question for the top section.\n\
         3. bulletPoints: an array of 3-5 concise points or facts for the middle section.\n\
         4. closingLine: a short emotional or faith-based sentence for the bottom.\n\
         Also give the collection a short name in collectionName.\n\n\
         Write all content in Arabic. Use an elegant, professional and spiritual tone.\n\
         Ensure the content is accurate to Islamic teachings."
    )
}

/// The `generateContent` request body for a topic.
pub fn request_body(topic: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": build_prompt(topic) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "collectionName": { "type": "STRING" },
                    "parts": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "title": { "type": "STRING" },
                                "hook": { "type": "STRING" },
                                "bulletPoints": {
                                    "type": "ARRAY",
                                    "items": { "type": "STRING" }
                                },
                                "closingLine": { "type": "STRING" }
                            },
                            "required": ["title", "hook", "bulletPoints", "closingLine"]
                        }
                    }
                },
                "required": ["collectionName", "parts"]
            }
        }
    })
}

/// Maps a non-success HTTP response onto the error taxonomy.
fn error_from_response(status: u16, body: &str) -> PortError {
    let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.chars().take(300).collect(),
    };
    classify_provider_failure(Some(status), &format!("HTTP {status} {detail}"))
}

/// Concatenates the text parts of the first candidate.
fn extract_text(body: &str) -> PortResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| PortError::MalformedResponse(format!("invalid response envelope: {e}")))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(PortError::ProviderUnavailable(format!(
            "prompt blocked: {reason}"
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PortError::MalformedResponse("response had no candidates".to_string()))?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(PortError::MalformedResponse(format!(
            "response contained no text (finish reason {reason})"
        )));
    }
    Ok(text)
}

/// Parses the model's text into a validated result.
pub fn parse_generation(text: &str) -> PortResult<GenerationResult> {
    let payload: CollectionPayload = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| PortError::MalformedResponse(e.to_string()))?;
    GenerationResult::new(payload.collection_name, payload.parts)
}

//=========================================================================================
// `ContentProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentProvider for GeminiContentAdapter {
    async fn generate(&self, topic: &str) -> PortResult<GenerationResult> {
        let key = self
            .credential
            .read()
            .await
            .clone()
            .ok_or(PortError::MissingCredential)?;

        debug!(model = %self.model, "Requesting generateContent.");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key.expose())
            .json(&request_body(topic))
            .send()
            .await
            .map_err(|e| {
                classify_provider_failure(e.status().map(|s| s.as_u16()), &e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::ProviderUnavailable(e.to_string()))?;

        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &body);
            warn!(status = status.as_u16(), kind = err.kind(), "Provider call failed.");
            return Err(err);
        }

        parse_generation(&extract_text(&body)?)
    }
}
