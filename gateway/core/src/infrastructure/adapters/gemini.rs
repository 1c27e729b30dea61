// Google Gemini Provider Adapter
//
// Normalizes the generateContent API. The API key travels as a query
// parameter, per Google's scheme.

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

pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialResolver>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata", default)]
    usage: UsageMetadata,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_tokens: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    completion_tokens: u32,
}

impl GeminiAdapter {
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
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_model(&self, model: &str) -> bool {
        model.starts_with("gemini")
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        let start = Instant::now();
        let api_key = self.credentials.resolve(self.name()).await?;

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.max_tokens.map(|max_output_tokens| GenerationConfig {
                max_output_tokens,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            request.model
        );
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error("gemini", &request.model, e))?;
        let response = map_status("gemini", response).await?;

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse {
                    provider: "gemini".into(),
                    message: format!("failed to parse response: {e}"),
                })?;

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| GatewayError::MalformedResponse {
                provider: "gemini".into(),
                message: "no candidates in response".into(),
            })?;
        let content: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        if content.is_empty() {
            return Err(GatewayError::MalformedResponse {
                provider: "gemini".into(),
                message: "candidate carries no text".into(),
            });
        }

        let cost = request
            .pricing
            .cost(parsed.usage.prompt_tokens, parsed.usage.completion_tokens);

        let mut metadata = HashMap::new();
        if let Some(reason) = &candidate.finish_reason {
            metadata.insert(
                "finish_reason".to_string(),
                serde_json::Value::String(reason.clone()),
            );
        }

        Ok(NormalizedResponse {
            content,
            provider: "gemini".into(),
            model: request.model.clone(),
            usage: TokenUsage {
                input: parsed.usage.prompt_tokens,
                output: parsed.usage.completion_tokens,
            },
            cost,
            metadata,
            latency: start.elapsed(),
        })
    }
}
