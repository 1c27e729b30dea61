// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Adapter Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain completion interface and one
// external provider API. Credential resolution is injected; adapters hold
// no secrets and no per-request state.

pub mod anthropic;
pub mod credentials;
pub mod gemini;
pub mod openai;
pub mod registry;

pub use credentials::{CredentialResolver, LayeredCredentialResolver, StaticCredentialResolver};
pub use registry::AdapterRegistry;
