// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Error Taxonomy
//
// One stable error enum shared by adapters, router and executor. Adapters
// translate upstream HTTP failures into these kinds; the executor decides
// per kind whether to advance the fallback chain or surface immediately.

use thiserror::Error;

/// Errors surfaced by the gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or rejected upstream credential.
    #[error("authentication failed for provider '{provider}': {message}")]
    Auth { provider: String, message: String },

    /// Upstream throttling (HTTP 429).
    #[error("rate limited by provider '{provider}'")]
    RateLimited { provider: String },

    /// Per-attempt deadline elapsed before the provider answered.
    #[error("request to {provider}/{model} timed out after {elapsed_ms}ms")]
    Timeout {
        provider: String,
        model: String,
        elapsed_ms: u64,
    },

    /// Transport failure or upstream 5xx.
    #[error("provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Upstream answered but the payload failed normalization.
    #[error("malformed response from provider '{provider}': {message}")]
    MalformedResponse { provider: String, message: String },

    /// Estimated cost exceeds the caller's budget. Never triggers fallback.
    #[error("estimated cost ${estimated:.4} exceeds budget ${budget:.4}")]
    BudgetExceeded { estimated: f64, budget: f64 },

    /// Routing produced an empty candidate list.
    #[error("no suitable provider for task type '{task_type}'")]
    NoSuitableProvider { task_type: String },

    /// The fallback chain is exhausted; carries the last inner error.
    #[error("all providers failed, last attempt {provider}/{model}: {source}")]
    AllProvidersFailed {
        provider: String,
        model: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// The caller's overall deadline elapsed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// A pinned provider is not registered.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Supplied routing weights do not sum to 1.0.
    #[error("routing weights must sum to 1.0, got {sum:.3}")]
    InvalidWeights { sum: f64 },

    /// Request failed validation before routing.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Stable label used by the `failed_requests_total` metric.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::NoSuitableProvider { .. } => "no_suitable_provider",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::InvalidWeights { .. } => "invalid_weights",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Whether the executor may advance to the next fallback candidate
    /// after this error. Everything else surfaces immediately.
    pub fn advances_fallback(&self) -> bool {
        matches!(
            self,
            Self::Auth { .. }
                | Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ProviderUnavailable { .. }
                | Self::MalformedResponse { .. }
        )
    }

    /// The (provider, model) the error terminated at, when known.
    pub fn target(&self) -> Option<(&str, &str)> {
        match self {
            Self::Timeout {
                provider, model, ..
            }
            | Self::AllProvidersFailed {
                provider, model, ..
            } => Some((provider.as_str(), model.as_str())),
            _ => None,
        }
    }
}
