//! Completion service providers.
//!
//! The pipeline treats text generation as a black box: it hands over a system
//! instruction and a user prompt and gets text back, or an error that is shown
//! to the caller in place of the recommendation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Request handed to a completion provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub user_prompt: String,
}

/// Generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

/// Trait for completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &'static str;

    /// Generate text for the request.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError>;
}

/// Responses API request body.
#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
}

/// Responses API output item.
#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

/// Content part of an output item.
#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Responses API response body.
#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

impl ResponsesResponse {
    /// Concatenated `output_text` parts of all output items.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| &item.content)
            .filter(|part| part.content_type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// API error payload.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI Responses API provider.
pub struct OpenAiProvider {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiProvider {
    /// Create a provider from configuration.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| CompletionError::NotConfigured("OPENAI_API_KEY not set".to_string()))?;

        let body = ResponsesRequest {
            model: &self.config.model,
            instructions: &request.system_instruction,
            input: &request.user_prompt,
        };

        debug!(
            model = %self.config.model,
            prompt_chars = request.user_prompt.len(),
            "Calling completion API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map_or(text, |e| e.error.message);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ResponsesResponse = serde_json::from_str(&text)?;
        let output = parsed.output_text();
        if output.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }

        Ok(CompletionResponse { text: output })
    }
}
