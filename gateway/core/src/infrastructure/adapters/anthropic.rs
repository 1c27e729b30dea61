// Anthropic Provider Adapter
//
// Normalizes the Anthropic messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::completion::{
    CompletionRequest, NormalizedResponse, ProviderAdapter, TokenUsage,
};
use crate::domain::errors::GatewayError;
use crate::infrastructure::adapters::credentials::CredentialResolver;
use crate::infrastructure::adapters::openai::{map_status, map_transport_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialResolver>,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    #[serde(flatten)]
    extra: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            client,
            base_url,
            credentials,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("claude")
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let start = Instant::now();
        let api_key = self.credentials.resolve(self.name()).await?;

        let body = MessagesRequest {
            model: &request.model,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            extra: &request.options,
        };

        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error("anthropic", &request.model, e))?;
        let response = map_status("anthropic", response).await?;

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse {
                    provider: "anthropic".into(),
                    message: format!("failed to parse response: {e}"),
                })?;

        let content = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| GatewayError::MalformedResponse {
                provider: "anthropic".into(),
                message: "empty content".into(),
            })?;

        let cost = request
            .pricing
            .cost(parsed.usage.input_tokens, parsed.usage.output_tokens);

        let mut metadata = HashMap::new();
        if let Some(reason) = &parsed.stop_reason {
            metadata.insert(
                "stop_reason".to_string(),
                serde_json::Value::String(reason.clone()),
            );
        }

        Ok(NormalizedResponse {
            content,
            provider: "anthropic".into(),
            model: request.model.clone(),
            usage: TokenUsage {
                input: parsed.usage.input_tokens,
                output: parsed.usage.output_tokens,
            },
            cost,
            metadata,
            latency: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::credentials::StaticCredentialResolver;

    #[test]
    fn supports_claude_models_only() {
        let adapter = AnthropicAdapter::new(
            reqwest::Client::new(),
            "https://api.anthropic.com/v1".into(),
            Arc::new(StaticCredentialResolver::single("anthropic", "sk-ant")),
        );
        assert!(adapter.supports_model("claude-3-opus"));
        assert!(adapter.supports_model("claude-3-sonnet"));
        assert!(!adapter.supports_model("gpt-4"));
        assert!(!adapter.supports_streaming());
    }
}
