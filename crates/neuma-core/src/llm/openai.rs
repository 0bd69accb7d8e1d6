use crate::constants::{defaults, endpoints};
use crate::error::NeumaError;
use crate::llm::traits::*;
use crate::llm::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .user_agent(defaults::USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Model identifiers available to the configured key.
    pub async fn list_models(&self) -> Result<Vec<String>, NeumaError> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| NeumaError::Provider(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NeumaError::Provider(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(NeumaError::Provider(format!(
                "OpenAI API error ({}): {}",
                status, text
            )));
        }

        let listing: OpenAIModelList = serde_json::from_str(&text)
            .map_err(|e| NeumaError::Provider(format!("Failed to parse model list: {e}")))?;
        let mut ids: Vec<String> = listing.data.into_iter().map(|m| m.id).collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    /// Read leniently by `usage_from_value`.
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenAIUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

fn usage_from_value(value: serde_json::Value) -> Option<TokenUsage> {
    let raw: OpenAIUsage = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable usage block");
            return None;
        }
    };
    if raw.prompt_tokens.is_none() && raw.completion_tokens.is_none() && raw.total_tokens.is_none()
    {
        return None;
    }
    let mut usage = TokenUsage::new(
        raw.prompt_tokens.unwrap_or(0),
        raw.completion_tokens.unwrap_or(0),
    );
    if let Some(total) = raw.total_tokens {
        usage.total_tokens = total;
    }
    Some(usage)
}

/// Parse a chat completion body. Only the first choice is read.
fn parse_completion(response_text: &str) -> Result<Completion, NeumaError> {
    let api_response: OpenAIResponse = serde_json::from_str(response_text)
        .map_err(|e| NeumaError::Provider(format!("Failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| NeumaError::Provider("No response from API".into()))?;

    Ok(Completion {
        content: choice.message.content.unwrap_or_default(),
        usage: api_response.usage.and_then(usage_from_value),
    })
}

#[derive(Debug, Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAIModel {
    id: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: &SamplingParams,
    ) -> Result<Completion, NeumaError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| NeumaError::Provider(format!("Request failed: {e}")))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| NeumaError::Provider(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(NeumaError::Provider(format!(
                "OpenAI API error ({}): {}",
                status, response_text
            )));
        }

        parse_completion(&response_text)
    }
}
