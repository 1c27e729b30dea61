// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Adapter Domain Interface (Anti-Corruption Layer)
//
// Defines the unified completion interface every upstream provider is
// normalized to. Adapters are stateless beyond an injected credential
// resolver: they never retry (the executor owns retries via the fallback
// chain) and they compute cost from the pricing carried in the request,
// never from hardcoded tables.
//
// Implementations in infrastructure/adapters/.

use super::errors::GatewayError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use super::provider::ModelPricing;

/// One normalized completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    /// Per-token pricing declared by the routed descriptor.
    pub pricing: ModelPricing,
    /// Pass-through provider options (temperature and similar).
    pub options: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

/// The provider-independent result shape the core always emits.
/// Adapter-specific fields live in `metadata` and are never promoted
/// to typed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
    /// USD, computed from the descriptor's pricing.
    pub cost: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub latency: Duration,
}

/// One incremental delivery unit on the streaming channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;

impl std::fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("name", &self.name())
            .finish()
    }
}

/// Anti-corruption layer over one upstream provider's completion API.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier, e.g. "openai".
    fn name(&self) -> &str;

    /// Whether this adapter can serve the given model identifier.
    fn supports_model(&self, model: &str) -> bool;

    /// Execute a completion and normalize the result.
    ///
    /// Must return promptly when the caller's deadline elapses (the
    /// executor wraps the call in a timeout and drops the future, which
    /// aborts the underlying transfer). Must populate token usage when
    /// the upstream supplies it.
    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError>;

    /// Whether the adapter has a native streaming variant.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Native streaming variant, when available. The default rejects;
    /// the streaming channel then falls back to a synthetic single chunk.
    async fn chat_completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, GatewayError> {
        Err(GatewayError::InvalidRequest(format!(
            "provider '{}' has no native streaming for model '{}'",
            self.name(),
            request.model
        )))
    }
}
