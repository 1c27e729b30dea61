// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Redis cache backend.
//
// Entries are stored as JSON strings; expiry is delegated to the backend
// via SET ... EX. A connection failure here is never fatal to a request:
// the executor downgrades get errors to misses and drops set errors.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use crate::domain::cache::{CacheEntry, CacheError, ResponseCache};

pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError(e.to_string()))
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CacheError(e.to_string()))?;

        match raw {
            None => Ok(None),
            Some(json) => match serde_json::from_str(&json) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    // Undecodable entries are dropped rather than surfaced.
                    debug!(key, error = %e, "discarding undecodable cache entry");
                    let _: Result<(), _> = conn.del(key).await;
                    Ok(None)
                }
            },
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;

        // Keep the newest entry for a fingerprint. The read-then-write
        // window is acceptable: at-most-once per key is a goal, not a
        // guarantee.
        let existing: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        if let Some(json) = existing {
            if let Ok(current) = serde_json::from_str::<CacheEntry>(&json) {
                if current.created_at > entry.created_at {
                    return Ok(());
                }
            }
        }

        let json = serde_json::to_string(&entry).map_err(|e| CacheError(e.to_string()))?;
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| CacheError(e.to_string()))?;
        Ok(())
    }
}
