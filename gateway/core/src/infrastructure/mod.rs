// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adapters;
pub mod cache;
pub mod crypto;
pub mod health;
pub mod metrics;
pub mod provider_store;

pub use adapters::AdapterRegistry;
pub use cache::{MemoryCache, RedisCache};
pub use health::{CircuitState, HealthTracker};
pub use metrics::MetricsSink;
pub use provider_store::ProviderStore;
