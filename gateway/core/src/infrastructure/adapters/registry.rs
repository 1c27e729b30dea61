// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter Registry
//
// Process-wide mapping from provider name to adapter instance. Populated
// once at startup and immutable afterwards, so reads are lock-free.
// Tests inject alternates by building a fresh registry per case.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::domain::completion::ProviderAdapter;
use crate::domain::config::GatewayConfigSpec;
use crate::domain::errors::GatewayError;
use crate::infrastructure::adapters::anthropic::AnthropicAdapter;
use crate::infrastructure::adapters::credentials::CredentialResolver;
use crate::infrastructure::adapters::gemini::GeminiAdapter;
use crate::infrastructure::adapters::openai::OpenAiAdapter;

pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Build the registry from configuration. One shared HTTP client is
    /// reused across all adapters.
    pub fn from_config(
        spec: &GatewayConfigSpec,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        let client = reqwest::Client::new();
        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();

        for provider in spec.providers.iter().filter(|p| p.enabled) {
            let adapter: Arc<dyn ProviderAdapter> = match provider.name.as_str() {
                "openai" => Arc::new(OpenAiAdapter::new(
                    client.clone(),
                    provider.base_url.clone(),
                    credentials.clone(),
                )),
                "anthropic" => Arc::new(AnthropicAdapter::new(
                    client.clone(),
                    provider.base_url.clone(),
                    credentials.clone(),
                )),
                "gemini" => Arc::new(GeminiAdapter::new(
                    client.clone(),
                    provider.base_url.clone(),
                    credentials.clone(),
                )),
                other => {
                    // OpenAI-compatible endpoints (vLLM, LM Studio, ...)
                    // are served by the OpenAI adapter shape.
                    tracing::warn!(
                        provider = other,
                        "unknown provider type, assuming an OpenAI-compatible endpoint"
                    );
                    Arc::new(OpenAiAdapter::new(
                        client.clone(),
                        provider.base_url.clone(),
                        credentials.clone(),
                    ))
                }
            };
            info!(provider = %provider.name, "registered provider adapter");
            adapters.insert(provider.name.clone(), adapter);
        }

        Self { adapters }
    }

    /// Build a registry from pre-constructed adapters. Used by tests.
    pub fn with_adapters(list: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        let mut adapters = HashMap::new();
        for adapter in list {
            adapters.insert(adapter.name().to_string(), adapter);
        }
        Self { adapters }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, GatewayError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}
