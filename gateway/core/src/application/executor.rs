// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Unary Request Executor
//!
//! Orchestrates one request end to end: cache lookup, classification,
//! routing, then the candidate loop over `[primary] ++ fallbacks`. There
//! are no per-candidate retries; advancing the fallback chain IS the retry
//! mechanism, which bounds worst-case wall time at
//! `len(candidates) × per-attempt-timeout` and keeps provider incidents
//! from compounding into retry storms.
//!
//! Every request emits exactly one terminal metric: a success record or a
//! terminal failure count. Per-attempt provider failures are counted
//! separately as they happen.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::application::classifier::classify;
use crate::application::router::Router;
use crate::domain::cache::{fingerprint, CacheEntry, ResponseCache};
use crate::domain::completion::{CompletionRequest, NormalizedResponse};
use crate::domain::errors::GatewayError;
use crate::domain::provider::{ProviderDescriptor, TaskType};
use crate::domain::routing::{QueryOptions, RoutingResult, TaskProfile};
use crate::infrastructure::health::HealthTracker;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::AdapterRegistry;

/// Hard ceiling on a single upstream attempt.
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
/// Attempt budget is the declared latency times this slack factor.
const LATENCY_SLACK: u64 = 3;

/// One gateway request, already parsed from the wire shape.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub prompt: String,
    pub task_type: Option<TaskType>,
    /// Pins the provider; requires `model` for a full pin.
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub options: QueryOptions,
}

/// The executor's answer for one request.
#[derive(Debug)]
pub struct QueryOutcome {
    pub response: NormalizedResponse,
    pub cache_hit: bool,
    /// Routing detail for the decision, absent on cache hits.
    pub routing: Option<RoutingResult>,
}

pub struct Executor {
    registry: Arc<AdapterRegistry>,
    router: Arc<Router>,
    cache: Arc<dyn ResponseCache>,
    health: Arc<HealthTracker>,
    metrics: Arc<MetricsSink>,
    cache_ttl: Duration,
}

impl Executor {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        router: Arc<Router>,
        cache: Arc<dyn ResponseCache>,
        health: Arc<HealthTracker>,
        metrics: Arc<MetricsSink>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            router,
            cache,
            health,
            metrics,
            cache_ttl,
        }
    }

    /// Validate, classify and route one request without executing it.
    /// Weight validation runs first: a bad weight set must fail before any
    /// cache read or upstream call.
    fn prepare(&self, request: &QueryRequest) -> Result<TaskProfile, GatewayError> {
        if let Some(criteria) = &request.options.criteria {
            criteria.validate()?;
        }
        if request.prompt.is_empty() {
            return Err(GatewayError::InvalidRequest("prompt must not be empty".into()));
        }
        if request.model.is_some() && request.provider.is_none() {
            return Err(GatewayError::InvalidRequest(
                "model pin requires a provider".into(),
            ));
        }
        if let Some(provider) = &request.provider {
            if !self.registry.contains(provider) {
                return Err(GatewayError::UnknownProvider(provider.clone()));
            }
        }

        Ok(classify(&request.prompt, request.task_type, &request.options))
    }

    fn route(
        &self,
        request: &QueryRequest,
        profile: &TaskProfile,
    ) -> Result<RoutingResult, GatewayError> {
        let pin = match (&request.provider, &request.model) {
            (Some(provider), Some(model)) => Some((provider.as_str(), model.as_str())),
            _ => None,
        };

        // A provider pinned without a model acts as a preference.
        let mut preferred = request.options.preferred_providers.clone();
        if let (Some(provider), None) = (&request.provider, &request.model) {
            preferred.push(provider.clone());
        }

        self.router
            .select(profile, pin, request.options.criteria, &preferred)
    }

    /// Execute one unary request.
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryOutcome, GatewayError> {
        let started = Instant::now();
        let profile = match self.prepare(&request) {
            Ok(profile) => profile,
            Err(e) => {
                self.metrics.record_failure("", "", e.error_type());
                return Err(e);
            }
        };
        let deadline = started + profile.time_constraint;

        let key = fingerprint(
            &request.prompt,
            profile.task_type,
            request.provider.as_deref().unwrap_or(""),
            request.model.as_deref().unwrap_or(""),
        );

        match self.cache.get(&key).await {
            Ok(Some(entry)) => {
                let mut response = entry.response;
                response.cost = 0.0;
                response.latency = started.elapsed();
                self.metrics.record_request(
                    profile.task_type.as_str(),
                    &response.provider,
                    &response.model,
                    response.latency,
                    0.0,
                    true,
                );
                debug!(key = %key, provider = %response.provider, "cache hit");
                return Ok(QueryOutcome {
                    response,
                    cache_hit: true,
                    routing: None,
                });
            }
            Ok(None) => {}
            Err(e) => {
                // Cache trouble degrades to a miss, never to a failure.
                warn!(error = %e, "cache get failed, treating as miss");
            }
        }

        let routing = match self.route(&request, &profile) {
            Ok(routing) => routing,
            Err(e) => {
                self.metrics.record_failure("", "", e.error_type());
                return Err(e);
            }
        };

        let candidates: Vec<ProviderDescriptor> = routing.candidates().cloned().collect();
        let mut last_error: Option<GatewayError> = None;
        let mut last_target: (String, String) = (String::new(), String::new());

        for descriptor in &candidates {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            // Budget gate: an over-budget candidate surfaces immediately,
            // it never falls through to a cheaper sibling.
            let estimated = f64::from(profile.token_estimate) * descriptor.cost_per_1k / 1000.0;
            if estimated > profile.max_budget {
                let err = GatewayError::BudgetExceeded {
                    estimated,
                    budget: profile.max_budget,
                };
                self.metrics
                    .record_failure(&descriptor.name, &descriptor.model, err.error_type());
                return Err(err);
            }

            let adapter = match self.registry.get(&descriptor.name) {
                Ok(adapter) => adapter,
                Err(e) => {
                    // Catalog and registry disagree; skip the candidate.
                    warn!(provider = %descriptor.name, "descriptor has no registered adapter");
                    self.metrics
                        .record_failure(&descriptor.name, &descriptor.model, e.error_type());
                    last_target = (descriptor.name.clone(), descriptor.model.clone());
                    last_error = Some(e);
                    continue;
                }
            };
            if !adapter.supports_model(&descriptor.model) {
                let e = GatewayError::ProviderUnavailable {
                    provider: descriptor.name.clone(),
                    message: format!("adapter does not serve model '{}'", descriptor.model),
                };
                self.metrics
                    .record_failure(&descriptor.name, &descriptor.model, e.error_type());
                last_target = (descriptor.name.clone(), descriptor.model.clone());
                last_error = Some(e);
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt_budget = remaining
                .min(Duration::from_millis(
                    descriptor.avg_latency_ms.saturating_mul(LATENCY_SLACK),
                ))
                .min(MAX_ATTEMPT_TIMEOUT);

            let completion = CompletionRequest {
                model: descriptor.model.clone(),
                prompt: request.prompt.clone(),
                max_tokens: request.max_tokens,
                pricing: descriptor.pricing,
                options: Default::default(),
            };

            let attempt_started = Instant::now();
            let attempt =
                tokio::time::timeout(attempt_budget, adapter.chat_completion(&completion)).await;

            match attempt {
                Ok(Ok(response)) => {
                    self.health
                        .update(&descriptor.name, &descriptor.model, true, None);
                    self.publish_health(descriptor);
                    self.metrics.record_provider_latency(
                        &descriptor.name,
                        &descriptor.model,
                        response.latency,
                    );

                    self.write_cache(&key, &response, deadline).await;

                    let latency = started.elapsed();
                    self.metrics.record_request(
                        profile.task_type.as_str(),
                        &response.provider,
                        &response.model,
                        latency,
                        response.cost,
                        false,
                    );
                    return Ok(QueryOutcome {
                        response,
                        cache_hit: false,
                        routing: Some(routing),
                    });
                }
                Ok(Err(e)) => {
                    if matches!(e, GatewayError::BudgetExceeded { .. }) {
                        self.metrics
                            .record_failure(&descriptor.name, &descriptor.model, e.error_type());
                        return Err(e);
                    }

                    self.note_failure(descriptor, &e);
                    if !e.advances_fallback() {
                        return Err(e);
                    }
                    last_target = (descriptor.name.clone(), descriptor.model.clone());
                    last_error = Some(e);
                }
                Err(_elapsed) => {
                    let e = GatewayError::Timeout {
                        provider: descriptor.name.clone(),
                        model: descriptor.model.clone(),
                        elapsed_ms: attempt_started.elapsed().as_millis() as u64,
                    };
                    self.note_failure(descriptor, &e);
                    last_target = (descriptor.name.clone(), descriptor.model.clone());
                    last_error = Some(e);
                }
            }
        }

        // The loop exited without a response: either the deadline ate the
        // remaining candidates or every attempt failed.
        if Instant::now() >= deadline {
            self.metrics
                .record_failure(&last_target.0, &last_target.1, "deadline_exceeded");
            return Err(GatewayError::DeadlineExceeded);
        }

        let inner = last_error.unwrap_or(GatewayError::DeadlineExceeded);
        let err = GatewayError::AllProvidersFailed {
            provider: last_target.0.clone(),
            model: last_target.1.clone(),
            source: Box::new(inner),
        };
        self.metrics
            .record_failure(&last_target.0, &last_target.1, err.error_type());
        Err(err)
    }

    /// Record a failed attempt in health and per-provider metrics.
    fn note_failure(&self, descriptor: &ProviderDescriptor, error: &GatewayError) {
        let message = error.to_string();
        if matches!(error, GatewayError::Auth { .. }) {
            // Credentials do not heal on their own.
            self.health
                .mark_open(&descriptor.name, &descriptor.model, &message);
        } else {
            self.health
                .update(&descriptor.name, &descriptor.model, false, Some(&message));
        }
        self.publish_health(descriptor);
        self.metrics
            .record_failure(&descriptor.name, &descriptor.model, error.error_type());
        warn!(
            provider = %descriptor.name,
            model = %descriptor.model,
            error = %error,
            "provider attempt failed"
        );
    }

    fn publish_health(&self, descriptor: &ProviderDescriptor) {
        let state = self.health.state(&descriptor.name, &descriptor.model);
        self.metrics
            .set_provider_health(&descriptor.name, &descriptor.model, state.gauge_value());
    }

    /// Best-effort cache write; skipped when the deadline has elapsed and
    /// logged-then-dropped on backend failure.
    async fn write_cache(&self, key: &str, response: &NormalizedResponse, deadline: Instant) {
        if Instant::now() >= deadline {
            return;
        }
        let entry = CacheEntry::new(response.clone());
        if let Err(e) = self.cache.set(key, entry, self.cache_ttl).await {
            warn!(error = %e, "cache set failed, dropping entry");
        }
        if let Some(size) = self.cache.size() {
            self.metrics.set_cache_size(size);
        }
    }
}
