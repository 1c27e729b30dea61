// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Credential Resolution
//
// Adapters never embed upstream credentials; they resolve them through
// this capability at call time so encrypted-at-rest keys can be rotated
// without adapter changes. Resolution order per call:
//
//   1. encrypted credential from the provider configuration store,
//      decrypted with the process-wide AES-256-GCM key
//   2. process environment fallback
//
// A missing credential fails with AuthError before any upstream contact.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::errors::GatewayError;
use crate::infrastructure::crypto;
use crate::infrastructure::provider_store::ProviderStore;

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, provider: &str) -> Result<String, GatewayError>;
}

/// Store-then-environment resolver used in production.
pub struct LayeredCredentialResolver {
    store: Option<Arc<ProviderStore>>,
    /// Hex-encoded AES-256 key from PROVIDER_SECRET_KEY. Absence disables
    /// encrypted-credential reads entirely.
    secret_key: Option<String>,
}

impl LayeredCredentialResolver {
    pub fn new(store: Option<Arc<ProviderStore>>) -> Self {
        Self {
            store,
            secret_key: std::env::var("PROVIDER_SECRET_KEY").ok(),
        }
    }

    pub fn with_secret(store: Option<Arc<ProviderStore>>, secret_key: Option<String>) -> Self {
        Self { store, secret_key }
    }

    fn env_var_for(provider: &str) -> String {
        match provider {
            "openai" => "OPENAI_API_KEY".to_string(),
            "anthropic" => "ANTHROPIC_API_KEY".to_string(),
            "gemini" => "GEMINI_API_KEY".to_string(),
            other => format!("{}_API_KEY", other.to_uppercase().replace('-', "_")),
        }
    }
}

#[async_trait]
impl CredentialResolver for LayeredCredentialResolver {
    async fn resolve(&self, provider: &str) -> Result<String, GatewayError> {
        if let (Some(store), Some(secret)) = (&self.store, &self.secret_key) {
            match store.encrypted_api_key(provider).await {
                Ok(Some(encrypted)) => match crypto::decrypt(&encrypted, secret) {
                    Ok(plaintext) => match String::from_utf8(plaintext) {
                        Ok(key) if !key.is_empty() => return Ok(key),
                        _ => warn!(provider, "stored credential is not valid UTF-8"),
                    },
                    Err(e) => warn!(provider, error = %e, "failed to decrypt stored credential"),
                },
                Ok(None) => {}
                Err(e) => warn!(provider, error = %e, "provider store unavailable"),
            }
        }

        match std::env::var(Self::env_var_for(provider)) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(GatewayError::Auth {
                provider: provider.to_string(),
                message: "no credential configured".to_string(),
            }),
        }
    }
}

/// Fixed-map resolver for tests and local setups.
#[derive(Default)]
pub struct StaticCredentialResolver {
    keys: HashMap<String, String>,
}

impl StaticCredentialResolver {
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    pub fn single(provider: &str, key: &str) -> Self {
        let mut keys = HashMap::new();
        keys.insert(provider.to_string(), key.to_string());
        Self { keys }
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, provider: &str) -> Result<String, GatewayError> {
        self.keys
            .get(provider)
            .cloned()
            .ok_or_else(|| GatewayError::Auth {
                provider: provider.to_string(),
                message: "no credential configured".to_string(),
            })
    }
}
