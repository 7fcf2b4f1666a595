//! Language model gateway.
//!
//! - [`LanguageModel`]: object-safe seam used by the extractor and the Q&A
//!   pipeline
//! - [`OpenAiCompatClient`]: OpenAI-compatible chat completions client
//!   (Groq by default)
//! - [`structured`]: typed, schema-validated completions

pub mod openai;

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

pub use openai::OpenAiCompatClient;

/// Expected shape of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// Free text.
    Text,
    /// A JSON object conforming to `schema`.
    Json {
        name: String,
        schema: serde_json::Value,
    },
}

/// One request to the model: system instructions plus user payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub shape: OutputShape,
}

impl LlmRequest {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            shape: OutputShape::Text,
        }
    }

    pub fn json<T: JsonSchema>(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            shape: OutputShape::Json {
                name: <T as JsonSchema>::schema_name(),
                schema: json_schema::<T>(),
            },
        }
    }
}

/// Request/response capability backed by a language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a request and return the raw reply text.
    async fn complete(&self, request: &LlmRequest) -> Result<String>;
}

/// Ask for a JSON reply and validate it against `T`.
///
/// The reply is untrusted: anything that does not deserialize into `T` is a
/// gateway error, never a partial result.
pub async fn structured<T>(model: &dyn LanguageModel, system: &str, user: &str) -> Result<T>
where
    T: JsonSchema + DeserializeOwned,
{
    let request = LlmRequest::json::<T>(system, user);
    let raw = model.complete(&request).await?;
    parse_json_reply(&raw)
}

/// Parse a JSON reply, tolerating a surrounding Markdown code fence.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body)
        .map_err(|e| Error::Gateway(format!("non-conforming structured reply: {}", e)))
}

/// JSON schema of `T` as a plain value.
pub fn json_schema<T: JsonSchema>() -> serde_json::Value {
    let schema = schema_for!(T);
    serde_json::to_value(schema).unwrap_or_default()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GraphFragment;

    #[test]
    fn parses_plain_json_reply() {
        let fragment: GraphFragment =
            parse_json_reply(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(fragment.is_empty());
    }

    #[test]
    fn parses_fenced_json_reply() {
        let raw = "```json\n{\"nodes\": [{\"id\": \"Apple\", \"type\": \"Company\"}], \"edges\": []}\n```";
        let fragment: GraphFragment = parse_json_reply(raw).unwrap();
        assert_eq!(fragment.nodes.len(), 1);
    }

    #[test]
    fn rejects_non_conforming_reply() {
        let err = parse_json_reply::<GraphFragment>(r#"{"nodes": "oops"}"#).unwrap_err();
        assert!(matches!(err, Error::Gateway(_)));
    }

    #[test]
    fn json_request_carries_schema() {
        let request = LlmRequest::json::<GraphFragment>("sys", "user");
        match request.shape {
            OutputShape::Json { name, schema } => {
                assert_eq!(name, "GraphFragment");
                assert!(schema.to_string().contains("sentiment"));
                assert!(schema.to_string().contains("Positive"));
            }
            OutputShape::Text => panic!("expected JSON shape"),
        }
    }
}
