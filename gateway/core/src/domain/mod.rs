// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cache;
pub mod completion;
pub mod config;
pub mod errors;
pub mod provider;
pub mod routing;

pub use cache::{fingerprint, CacheEntry, CacheError, ResponseCache};
pub use completion::{
    ChunkStream, CompletionRequest, NormalizedResponse, ProviderAdapter, StreamChunk, TokenUsage,
};
pub use config::GatewayConfigManifest;
pub use errors::GatewayError;
pub use provider::{ModelPricing, ProviderCatalog, ProviderDescriptor, TaskType};
pub use routing::{QueryOptions, RoutingCriteria, RoutingResult, TaskProfile};
