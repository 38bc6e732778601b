//! Prompt enhancement through an OpenAI-compatible chat-completions API.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use visionary_core::visualization::GenerationType;

const SYSTEM_PROMPT: &str = "You rewrite short user ideas into vivid prompts for generative \
image and video models. Keep the user's subject and intent, add concrete visual detail \
(composition, lighting, lens, texture), and answer with the prompt text only, without \
quotes or commentary.";

/// Longest prompt accepted back from the model.
const MAX_ENHANCED_CHARS: usize = 2000;

/// Body of `POST /prompts/enhance`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub original_prompt: String,
    #[serde(default)]
    pub target_generation: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnhanceError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("LLM response contained no text")]
    EmptyResponse,
}

/// Chat-completions client used to enhance prompts.
#[derive(Clone)]
pub struct PromptEnhancer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl PromptEnhancer {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    /// Rewrite the prompt. Errors are returned; callers decide on fallback.
    pub async fn enhance(&self, request: &EnhanceRequest) -> Result<String, EnhanceError> {
        if request.original_prompt.trim().is_empty() {
            return Err(EnhanceError::EmptyPrompt);
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_message(request) },
            ],
            "temperature": 0.7,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Prompt enhancement request rejected");
            return Err(EnhanceError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        let enhanced = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(clean_completion)
            .filter(|text| !text.is_empty())
            .ok_or(EnhanceError::EmptyResponse)?;

        tracing::debug!(model = %self.model, chars = enhanced.len(), "Prompt enhanced");
        Ok(enhanced)
    }
}

fn user_message(request: &EnhanceRequest) -> String {
    let target = request
        .target_generation
        .as_deref()
        .and_then(|t| GenerationType::parse(t).ok())
        .unwrap_or(GenerationType::Image);

    let mut message = format!(
        "Target: {} generation.\nIdea: {}",
        target.as_str(),
        request.original_prompt.trim()
    );
    for (label, value) in [
        ("Style", &request.style),
        ("Mood", &request.mood),
        ("Extra details", &request.details),
    ] {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            message.push_str(&format!("\n{label}: {value}"));
        }
    }
    message
}

/// Strip wrapping quotes and cap the length.
fn clean_completion(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .chars()
        .take(MAX_ENHANCED_CHARS)
        .collect()
}
