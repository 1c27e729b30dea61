// OpenAI Provider Adapter
//
// Normalizes the chat completions API, including native SSE streaming.
// Also works with OpenAI-compatible endpoints (vLLM, LM Studio, etc.)
// when pointed at a different base URL.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::completion::{
    ChunkStream, CompletionRequest, NormalizedResponse, ProviderAdapter, StreamChunk, TokenUsage,
};
use crate::domain::errors::GatewayError;
use crate::infrastructure::adapters::credentials::CredentialResolver;

pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialResolver>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(flatten)]
    extra: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiAdapter {
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

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GatewayError> {
        let api_key = self.credentials.resolve(self.name()).await?;

        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            stream,
            extra: &request.options,
        };

        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error("openai", &request.model, e))?;

        map_status("openai", response).await
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3")
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let start = Instant::now();
        let response = self.send(request, false).await?;

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse {
                    provider: "openai".into(),
                    message: format!("failed to parse response: {e}"),
                })?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| GatewayError::MalformedResponse {
                provider: "openai".into(),
                message: "no choices in response".into(),
            })?;
        let content =
            choice
                .message
                .content
                .clone()
                .ok_or_else(|| GatewayError::MalformedResponse {
                    provider: "openai".into(),
                    message: "choice carries no content".into(),
                })?;

        let usage = parsed.usage.unwrap_or_default();
        let cost = request
            .pricing
            .cost(usage.prompt_tokens, usage.completion_tokens);

        let mut metadata = HashMap::new();
        if let Some(reason) = &choice.finish_reason {
            metadata.insert(
                "finish_reason".to_string(),
                serde_json::Value::String(reason.clone()),
            );
        }

        Ok(NormalizedResponse {
            content,
            provider: "openai".into(),
            model: request.model.clone(),
            usage: TokenUsage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
            },
            cost,
            metadata,
            latency: start.elapsed(),
        })
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn chat_completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, GatewayError> {
        let response = self.send(request, true).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            return None;
                        }
                        match serde_json::from_str::<StreamEvent>(&event.data) {
                            Ok(parsed) => {
                                let choice = parsed.choices.into_iter().next()?;
                                Some(Ok(StreamChunk {
                                    delta: choice.delta.content.unwrap_or_default(),
                                    finish_reason: choice.finish_reason,
                                }))
                            }
                            Err(e) => Some(Err(GatewayError::MalformedResponse {
                                provider: "openai".into(),
                                message: format!("bad stream event: {e}"),
                            })),
                        }
                    }
                    Err(e) => Some(Err(GatewayError::ProviderUnavailable {
                        provider: "openai".into(),
                        message: format!("stream interrupted: {e}"),
                    })),
                }
            });

        Ok(Box::pin(stream))
    }
}

/// Translate transport failures to the stable taxonomy.
pub(crate) fn map_transport_error(provider: &str, model: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout {
            provider: provider.to_string(),
            model: model.to_string(),
            elapsed_ms: 0,
        }
    } else {
        GatewayError::ProviderUnavailable {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Translate HTTP status failures to the stable taxonomy.
pub(crate) async fn map_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(if status == 401 || status == 403 {
        GatewayError::Auth {
            provider: provider.to_string(),
            message: body,
        }
    } else if status == 429 {
        GatewayError::RateLimited {
            provider: provider.to_string(),
        }
    } else {
        GatewayError::ProviderUnavailable {
            provider: provider.to_string(),
            message: format!("HTTP {status}: {body}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_support_is_prefix_based() {
        let adapter = OpenAiAdapter::new(
            reqwest::Client::new(),
            "https://api.openai.com/v1".into(),
            Arc::new(crate::infrastructure::adapters::credentials::StaticCredentialResolver::single(
                "openai", "sk-test",
            )),
        );
        assert!(adapter.supports_model("gpt-4"));
        assert!(adapter.supports_model("gpt-3.5-turbo"));
        assert!(!adapter.supports_model("claude-3-opus"));
        assert!(adapter.supports_streaming());
    }

    #[tokio::test]
    async fn missing_credential_fails_before_network() {
        let adapter = OpenAiAdapter::new(
            reqwest::Client::new(),
            // Unroutable on purpose: resolution must fail first.
            "http://127.0.0.1:1".into(),
            Arc::new(crate::infrastructure::adapters::credentials::StaticCredentialResolver::default()),
        );
        let request = CompletionRequest {
            model: "gpt-4".into(),
            prompt: "hello".into(),
            max_tokens: None,
            pricing: Default::default(),
            options: HashMap::new(),
        };
        match adapter.chat_completion(&request).await {
            Err(GatewayError::Auth { provider, .. }) => assert_eq!(provider, "openai"),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }
}
