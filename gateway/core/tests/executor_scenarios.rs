// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end executor scenarios driven through scripted adapters:
//! cache hits, fallback ordering, circuit opening and quarantine
//! re-entry, deadline enforcement, pin substitution and weight
//! validation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use conduit_core::application::{Executor, QueryRequest, Router, StreamingChannel};
use conduit_core::domain::cache::{fingerprint, CacheEntry, ResponseCache};
use conduit_core::domain::completion::{
    CompletionRequest, NormalizedResponse, ProviderAdapter, TokenUsage,
};
use conduit_core::domain::errors::GatewayError;
use conduit_core::domain::provider::{
    ModelPricing, ProviderCatalog, ProviderDescriptor, TaskType,
};
use conduit_core::domain::routing::{QueryOptions, RoutingCriteria};
use conduit_core::infrastructure::{
    AdapterRegistry, CircuitState, HealthTracker, MemoryCache, MetricsSink,
};

// ============================================================================
// Scripted adapter
// ============================================================================

enum Behavior {
    Succeed { content: String },
    Unavailable,
    Hang,
}

struct ScriptedAdapter {
    name: String,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn succeed(name: &str, content: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behavior: Behavior::Succeed {
                content: content.into(),
            },
            calls: AtomicUsize::new(0),
        })
    }

    fn unavailable(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behavior: Behavior::Unavailable,
            calls: AtomicUsize::new(0),
        })
    }

    fn hanging(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behavior: Behavior::Hang,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    async fn chat_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<NormalizedResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed { content } => Ok(NormalizedResponse {
                content: content.clone(),
                provider: self.name.clone(),
                model: request.model.clone(),
                usage: TokenUsage {
                    input: 10,
                    output: 5,
                },
                cost: request.pricing.cost(10, 5),
                metadata: HashMap::new(),
                latency: Duration::from_millis(5),
            }),
            Behavior::Unavailable => Err(GatewayError::ProviderUnavailable {
                provider: self.name.clone(),
                message: "injected outage".into(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Err(GatewayError::ProviderUnavailable {
                    provider: self.name.clone(),
                    message: "unreachable".into(),
                })
            }
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

fn descriptor(
    name: &str,
    model: &str,
    cost: f64,
    latency_ms: u64,
    reliability: f64,
) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.into(),
        model: model.into(),
        cost_per_1k: cost,
        pricing: ModelPricing {
            prompt_per_1k: cost,
            completion_per_1k: cost,
        },
        avg_latency_ms: latency_ms,
        reliability,
        max_tokens: 8000,
        capabilities: vec!["text-generation".into()],
    }
}

struct Harness {
    executor: Executor,
    cache: Arc<MemoryCache>,
    health: Arc<HealthTracker>,
    metrics: Arc<MetricsSink>,
}

fn harness(
    descriptors: Vec<ProviderDescriptor>,
    adapters: Vec<Arc<ScriptedAdapter>>,
    health: Arc<HealthTracker>,
) -> Harness {
    let mut catalog = ProviderCatalog::new();
    for d in descriptors {
        catalog.register(TaskType::TextGeneration, d);
    }
    let catalog = Arc::new(catalog);

    let registry = Arc::new(AdapterRegistry::with_adapters(
        adapters
            .into_iter()
            .map(|a| a as Arc<dyn ProviderAdapter>)
            .collect(),
    ));
    let metrics = Arc::new(MetricsSink::new());
    let cache = Arc::new(MemoryCache::new());
    let router = Arc::new(Router::new(catalog, health.clone()));

    let executor = Executor::new(
        registry,
        router,
        cache.clone() as Arc<dyn ResponseCache>,
        health.clone(),
        metrics.clone(),
        Duration::from_secs(3600),
    );

    Harness {
        executor,
        cache,
        health,
        metrics,
    }
}

fn request(prompt: &str) -> QueryRequest {
    QueryRequest {
        prompt: prompt.into(),
        ..Default::default()
    }
}

// ============================================================================
// S1 - cache hit, zero cost
// ============================================================================

#[tokio::test]
async fn cache_hit_returns_cached_content_at_zero_cost() {
    let openai = ScriptedAdapter::succeed("openai", "freshly generated");
    let h = harness(
        vec![descriptor("openai", "gpt-3.5-turbo", 0.002, 1000, 0.9)],
        vec![openai.clone()],
        Arc::new(HealthTracker::new()),
    );

    let key = fingerprint("hello", TaskType::TextGeneration, "openai", "gpt-3.5-turbo");
    let cached = NormalizedResponse {
        content: "hi".into(),
        provider: "openai".into(),
        model: "gpt-3.5-turbo".into(),
        usage: TokenUsage { input: 5, output: 2 },
        cost: 0.002,
        metadata: HashMap::new(),
        latency: Duration::from_millis(800),
    };
    h.cache
        .set(&key, CacheEntry::new(cached), Duration::from_secs(3600))
        .await
        .unwrap();

    let mut req = request("hello");
    req.provider = Some("openai".into());
    req.model = Some("gpt-3.5-turbo".into());

    let outcome = h.executor.execute(req).await.unwrap();

    assert!(outcome.cache_hit);
    assert_eq!(outcome.response.content, "hi");
    assert_eq!(outcome.response.cost, 0.0);
    assert_eq!(outcome.response.provider, "openai");
    assert_eq!(openai.calls(), 0, "cache hit must not touch the adapter");
    assert_eq!(
        h.metrics
            .cache_hit_count("text-generation", "openai", "gpt-3.5-turbo"),
        1
    );
}

// ============================================================================
// S2 - primary fails, first fallback succeeds
// ============================================================================

#[tokio::test]
async fn fallback_serves_after_primary_failure() {
    // alpha outranks beta on every score component.
    let alpha = ScriptedAdapter::unavailable("alpha");
    let beta = ScriptedAdapter::succeed("beta", "ok");
    let h = harness(
        vec![
            descriptor("alpha", "m1", 0.001, 500, 0.99),
            descriptor("beta", "m2", 0.02, 3000, 0.85),
        ],
        vec![alpha.clone(), beta.clone()],
        Arc::new(HealthTracker::new()),
    );

    let outcome = h.executor.execute(request("ping")).await.unwrap();

    assert_eq!(outcome.response.content, "ok");
    assert_eq!(outcome.response.provider, "beta");
    assert_eq!(alpha.calls(), 1);
    assert_eq!(beta.calls(), 1);

    // Exactly one provider-level failure and one terminal success.
    assert_eq!(h.metrics.failure_count("alpha", "m1", "provider_unavailable"), 1);
    assert_eq!(h.metrics.request_count("text-generation", "beta", "m2"), 1);

    let record = h.health.record("alpha", "m1").unwrap();
    assert_eq!(record.error_count, 1);
    assert_eq!(record.state, CircuitState::Degraded);
    assert_eq!(h.health.state("beta", "m2"), CircuitState::Healthy);
}

// ============================================================================
// S3 - circuit opens after T failures, quarantine re-admits
// ============================================================================

#[tokio::test]
async fn circuit_opens_and_recovers_after_quarantine() {
    let alpha = ScriptedAdapter::unavailable("alpha");
    let beta = ScriptedAdapter::succeed("beta", "ok");
    let health = Arc::new(HealthTracker::with_limits(5, Duration::from_millis(200)));
    let h = harness(
        vec![
            descriptor("alpha", "m1", 0.001, 500, 0.99),
            descriptor("beta", "m2", 0.02, 3000, 0.85),
        ],
        vec![alpha.clone(), beta.clone()],
        health,
    );

    // Five requests, each failing over from alpha to beta.
    for i in 0..5 {
        let outcome = h
            .executor
            .execute(request(&format!("ping number {i}")))
            .await
            .unwrap();
        assert_eq!(outcome.response.provider, "beta");
        assert_eq!(outcome.routing.as_ref().unwrap().primary.name, "alpha");
    }
    assert_eq!(alpha.calls(), 5);
    assert_eq!(h.health.state("alpha", "m1"), CircuitState::Open);

    // With the circuit open, routing skips alpha entirely.
    let outcome = h.executor.execute(request("after the trip")).await.unwrap();
    assert_eq!(outcome.routing.as_ref().unwrap().primary.name, "beta");
    assert_eq!(alpha.calls(), 5, "open circuit must not be attempted");

    // After the quarantine window, alpha is probed again.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let outcome = h.executor.execute(request("probe attempt")).await.unwrap();
    assert_eq!(outcome.routing.as_ref().unwrap().primary.name, "alpha");
    assert_eq!(alpha.calls(), 6, "stale circuit admits one probe");
    assert_eq!(outcome.response.provider, "beta");
    assert_eq!(h.health.state("alpha", "m1"), CircuitState::Open);
}

// ============================================================================
// S4 - deadline honored with hanging providers
// ============================================================================

#[tokio::test]
async fn deadline_bounds_total_wall_time() {
    // avg_latency 60ms -> 180ms attempt budget; the third attempt is
    // truncated by the remaining deadline.
    let a = ScriptedAdapter::hanging("a");
    let b = ScriptedAdapter::hanging("b");
    let c = ScriptedAdapter::hanging("c");
    let h = harness(
        vec![
            descriptor("a", "m1", 0.001, 60, 0.99),
            descriptor("b", "m2", 0.002, 60, 0.95),
            descriptor("c", "m3", 0.003, 60, 0.90),
        ],
        vec![a.clone(), b.clone(), c.clone()],
        Arc::new(HealthTracker::new()),
    );

    let mut req = request("please respond");
    req.options = QueryOptions {
        time_constraint: Some(Duration::from_millis(500)),
        ..Default::default()
    };

    let started = Instant::now();
    let result = h.executor.execute(req).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(GatewayError::DeadlineExceeded)));
    assert!(
        elapsed <= Duration::from_millis(550),
        "deadline overshot: {elapsed:?}"
    );

    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 1);
    assert_eq!(h.metrics.failure_count("a", "m1", "timeout"), 1);
    assert_eq!(h.metrics.failure_count("b", "m2", "timeout"), 1);
    assert_eq!(h.metrics.failure_count("c", "m3", "timeout"), 1);
}

// ============================================================================
// S5 - pinned but unhealthy provider is substituted
// ============================================================================

#[tokio::test]
async fn open_circuit_overrides_pin_and_records_substitution() {
    let openai = ScriptedAdapter::succeed("openai", "from openai");
    let anthropic = ScriptedAdapter::succeed("anthropic", "from anthropic");
    let h = harness(
        vec![
            descriptor("openai", "gpt-4", 0.03, 2000, 0.95),
            descriptor("anthropic", "claude-3-sonnet", 0.003, 1500, 0.95),
        ],
        vec![openai.clone(), anthropic.clone()],
        Arc::new(HealthTracker::new()),
    );

    for _ in 0..5 {
        h.health
            .update("openai", "gpt-4", false, Some("upstream outage"));
    }
    assert_eq!(h.health.state("openai", "gpt-4"), CircuitState::Open);

    let mut req = request("tell me something new");
    req.provider = Some("openai".into());
    req.model = Some("gpt-4".into());

    let outcome = h.executor.execute(req).await.unwrap();

    assert_eq!(outcome.response.provider, "anthropic");
    assert_eq!(openai.calls(), 0);
    let routing = outcome.routing.unwrap();
    assert!(routing.reasoning.contains("openai/gpt-4"));
    assert!(routing.reasoning.contains("substituted"));
}

// ============================================================================
// S6 - invalid weights fail before any routing
// ============================================================================

#[tokio::test]
async fn invalid_weights_fail_fast() {
    let alpha = ScriptedAdapter::succeed("alpha", "never seen");
    let h = harness(
        vec![descriptor("alpha", "m1", 0.001, 500, 0.99)],
        vec![alpha.clone()],
        Arc::new(HealthTracker::new()),
    );

    let mut req = request("weighted request");
    req.options = QueryOptions {
        criteria: Some(RoutingCriteria {
            cost_weight: 0.5,
            latency_weight: 0.5,
            reliability_weight: 0.5,
            quality_weight: 0.1,
        }),
        ..Default::default()
    };

    match h.executor.execute(req).await {
        Err(GatewayError::InvalidWeights { sum }) => assert!((sum - 1.6).abs() < 1e-9),
        other => panic!("expected InvalidWeights, got {other:?}"),
    }
    assert_eq!(alpha.calls(), 0, "weights must be rejected before any upstream call");
}

// ============================================================================
// Additional properties
// ============================================================================

/// Fallback chain order is the scored order; the first healthy candidate
/// that succeeds serves the request.
#[tokio::test]
async fn fallback_chain_walks_in_ranked_order() {
    let a = ScriptedAdapter::unavailable("a");
    let b = ScriptedAdapter::unavailable("b");
    let c = ScriptedAdapter::succeed("c", "third time lucky");
    let h = harness(
        vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.002, 800, 0.97),
            descriptor("c", "m3", 0.004, 1200, 0.93),
        ],
        vec![a.clone(), b.clone(), c.clone()],
        Arc::new(HealthTracker::new()),
    );

    let outcome = h.executor.execute(request("walk the chain")).await.unwrap();

    assert_eq!(outcome.response.provider, "c");
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
    assert_eq!(c.calls(), 1);
}

/// Exhausting the chain surfaces AllProvidersFailed with the last error.
#[tokio::test]
async fn exhausted_chain_reports_last_failure() {
    let a = ScriptedAdapter::unavailable("a");
    let b = ScriptedAdapter::unavailable("b");
    let h = harness(
        vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.002, 800, 0.97),
        ],
        vec![a, b],
        Arc::new(HealthTracker::new()),
    );

    match h.executor.execute(request("doomed")).await {
        Err(GatewayError::AllProvidersFailed {
            provider, source, ..
        }) => {
            assert_eq!(provider, "b");
            assert!(matches!(
                *source,
                GatewayError::ProviderUnavailable { .. }
            ));
        }
        other => panic!("expected AllProvidersFailed, got {other:?}"),
    }
}

/// A successful unary call lands in the cache; the repeat is served from
/// it without another upstream call.
#[tokio::test]
async fn successful_response_is_cached_for_repeats() {
    let alpha = ScriptedAdapter::succeed("alpha", "cached next time");
    let h = harness(
        vec![descriptor("alpha", "m1", 0.001, 500, 0.99)],
        vec![alpha.clone()],
        Arc::new(HealthTracker::new()),
    );

    let first = h.executor.execute(request("repeat me")).await.unwrap();
    assert!(!first.cache_hit);
    assert!(first.response.cost > 0.0);

    let second = h.executor.execute(request("repeat me")).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.response.cost, 0.0);
    assert_eq!(second.response.content, "cached next time");
    assert_eq!(alpha.calls(), 1);
}

/// A budget-exceeding candidate surfaces immediately with no fallback.
#[tokio::test]
async fn budget_violation_does_not_fall_back() {
    let pricey = ScriptedAdapter::succeed("pricey", "expensive");
    let cheap = ScriptedAdapter::succeed("cheap", "affordable");
    let h = harness(
        vec![
            // High reliability and low latency keep pricey on top despite
            // its zero cost score.
            descriptor("pricey", "m1", 10.0, 100, 0.999),
            descriptor("cheap", "m2", 0.0001, 4000, 0.5),
        ],
        vec![pricey.clone(), cheap.clone()],
        Arc::new(HealthTracker::new()),
    );

    let mut req = request("short prompt");
    req.options = QueryOptions {
        max_budget: Some(0.0001),
        ..Default::default()
    };

    match h.executor.execute(req).await {
        Err(GatewayError::BudgetExceeded { estimated, budget }) => {
            assert!(estimated > budget);
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
    assert_eq!(pricey.calls(), 0);
    assert_eq!(cheap.calls(), 0, "budget errors must not fall back");
}

/// The streaming channel reuses routing and health but never the cache.
#[tokio::test]
async fn streaming_falls_back_to_synthetic_chunk() {
    use futures::StreamExt;

    let alpha = ScriptedAdapter::succeed("alpha", "full response");
    let health = Arc::new(HealthTracker::new());
    let mut catalog = ProviderCatalog::new();
    catalog.register(
        TaskType::TextGeneration,
        descriptor("alpha", "m1", 0.001, 500, 0.99),
    );
    let catalog = Arc::new(catalog);
    let registry = Arc::new(AdapterRegistry::with_adapters(vec![
        alpha.clone() as Arc<dyn ProviderAdapter>
    ]));
    let metrics = Arc::new(MetricsSink::new());
    let router = Arc::new(Router::new(catalog, health.clone()));
    let channel = StreamingChannel::new(registry, router, health.clone(), metrics);

    let stream = channel.stream(request("stream me")).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;

    assert_eq!(chunks.len(), 2);
    let first = chunks[0].as_ref().unwrap();
    assert_eq!(first.delta, "full response");
    assert!(first.finish_reason.is_none());
    let terminal = chunks[1].as_ref().unwrap();
    assert_eq!(terminal.delta, "");
    assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));

    assert_eq!(health.state("alpha", "m1"), CircuitState::Healthy);
    assert_eq!(alpha.calls(), 1);
}
