// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-memory cache backend.
//
// Concurrent map with lazy TTL eviction: expired entries are removed on
// the read that observes them. No eviction bound is enforced here;
// deployments that need one put Redis in front via CACHE_TYPE=redis.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::cache::{CacheEntry, CacheError, ResponseCache};
use crate::infrastructure::metrics::MetricsSink;

struct StoredEntry {
    entry: CacheEntry,
    expires_at: DateTime<Utc>,
}

pub struct MemoryCache {
    entries: DashMap<String, StoredEntry>,
    evictions: AtomicU64,
    metrics: Option<Arc<MetricsSink>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            evictions: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Report evictions and size to the metrics registry.
    pub fn with_metrics(metrics: Arc<MetricsSink>) -> Self {
        Self {
            entries: DashMap::new(),
            evictions: AtomicU64::new(0),
            metrics: Some(metrics),
        }
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn note_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_eviction();
            metrics.set_cache_size(self.entries.len());
        }
    }

    fn note_size(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_cache_size(self.entries.len());
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(stored) => {
                if stored.expires_at > Utc::now() {
                    return Ok(Some(stored.entry.clone()));
                }
                true
            }
        };

        if expired {
            self.entries.remove(key);
            self.note_eviction();
        }
        Ok(None)
    }

    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError(format!("ttl out of range: {e}")))?;

        match self.entries.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                // Never clobber a newer entry for the same fingerprint.
                if occupied.get().entry.created_at > entry.created_at {
                    return Ok(());
                }
                let expires_at = entry.created_at + ttl;
                occupied.insert(StoredEntry { entry, expires_at });
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let expires_at = entry.created_at + ttl;
                vacant.insert(StoredEntry { entry, expires_at });
            }
        }
        self.note_size();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        self.note_size();
        Ok(())
    }

    fn size(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}
