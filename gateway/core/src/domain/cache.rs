// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Response Cache Domain Interface
//
// Fingerprint -> normalized-response store with per-entry TTL. Backends
// are pluggable (in-memory, Redis); failures are non-fatal by contract:
// the executor treats get errors as misses and drops set errors.

use super::completion::NormalizedResponse;
use super::provider::TaskType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;

/// Stable cache key: SHA-256 over the request identity, hex-encoded.
/// Keys are case- and whitespace-sensitive; the prompt is not normalized.
pub fn fingerprint(prompt: &str, task_type: TaskType, provider: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(task_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(provider.as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hex::encode(hasher.finalize())
}

/// A cached normalized response. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: NormalizedResponse,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(response: NormalizedResponse) -> Self {
        Self {
            provider: response.provider.clone(),
            model: response.model.clone(),
            response,
            created_at: Utc::now(),
        }
    }
}

/// Backend failure. Never surfaced to callers of the executor.
#[derive(Debug, Error)]
#[error("cache backend unavailable: {0}")]
pub struct CacheError(pub String);

#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up an entry. `Ok(None)` is a miss; expired entries read as
    /// misses and may be evicted lazily.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry with a TTL. Must not overwrite an existing entry
    /// whose `created_at` is newer.
    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Current entry count, when the backend can report it cheaply.
    fn size(&self) -> Option<usize> {
        None
    }
}
