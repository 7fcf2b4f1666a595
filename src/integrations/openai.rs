//! OpenAI-compatible chat completions client (Groq, OpenAI, local gateways).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{LanguageModel, LlmRequest, OutputShape};
use crate::config::LlmConfig;
use crate::{Error, Result};

/// Chat completions client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl OpenAiCompatClient {
    /// Create client from the `llm` config section.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("llm.api_key is empty (set GROQ_API_KEY)".to_string()));
        }

        let http = Client::builder()
            .user_agent("insider_graph/0.1.0")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Gateway(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &LlmRequest) -> ChatRequest {
        let (system, response_format) = match &request.shape {
            OutputShape::Text => (request.system.clone(), None),
            OutputShape::Json { name, schema } => (
                format!(
                    "{}\n\nRespond with a single JSON object named {} that validates against this JSON schema:\n{}",
                    request.system, name, schema
                ),
                Some(json!({ "type": "json_object" })),
            ),
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(request.user.clone()),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String> {
        let body = self.build_request(request);
        debug!(model = %self.model, "Sending chat completion");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout {
                        operation: "chat completion".to_string(),
                        secs: self.timeout_secs,
                    }
                } else {
                    Error::Gateway(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Gateway(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Gateway(format!("LLM error {}: {}", status, text)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Gateway(format!("Invalid response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Gateway("Empty response from model".to_string()))
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
