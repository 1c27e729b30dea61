// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Conduit Gateway Core
//!
//! The request-orchestration pipeline of the Conduit LLM gateway: task
//! classification and provider scoring, response caching, circuit-broken
//! fallback execution, streaming delivery, and the metrics feedback loop
//! that closes over routing.
//!
//! # Architecture
//!
//! - **domain**: descriptors, routing types, the adapter trait, cache
//!   trait, error taxonomy, configuration schema
//! - **application**: classifier, router/scorer, executor, streaming
//! - **infrastructure**: provider adapters, registry, cache backends,
//!   health tracker, metrics, credential cipher, provider store
//! - **presentation**: HTTP surface

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
