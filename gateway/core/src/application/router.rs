// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Router/Scorer
//!
//! Selects a provider for a task profile and produces the ordered fallback
//! chain. Scoring is a weighted sum over declared cost, latency and
//! reliability plus a static per-(model, task) quality matrix. The result
//! is deterministic for fixed descriptors, health state and options: ties
//! are broken by (name, model) lexicographic order.

use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::GatewayError;
use crate::domain::provider::{ProviderCatalog, ProviderDescriptor, TaskType};
use crate::domain::routing::{RoutingCriteria, RoutingResult, TaskProfile};
use crate::infrastructure::health::HealthTracker;

/// Normalization ceiling for the cost component (USD per 1k tokens).
const COST_CEILING: f64 = 0.05;
/// Normalization ceiling for the latency component (milliseconds).
const LATENCY_CEILING: f64 = 5000.0;
/// Quality score for (model, task) pairs absent from the matrix.
const DEFAULT_QUALITY: f64 = 0.7;
/// Maximum fallback chain length.
const MAX_FALLBACKS: usize = 3;

/// Static quality matrix. Updated alongside the provider catalog when new
/// models are onboarded.
fn quality_score(model: &str, task: TaskType) -> f64 {
    match (model, task) {
        ("gpt-4", TaskType::TextGeneration) => 0.95,
        ("gpt-4", TaskType::CodeGeneration) => 0.90,
        ("gpt-4", TaskType::Summarization) => 0.85,
        ("gpt-3.5-turbo", TaskType::TextGeneration) => 0.80,
        ("gpt-3.5-turbo", TaskType::CodeGeneration) => 0.70,
        ("gpt-3.5-turbo", TaskType::Summarization) => 0.85,
        ("claude-3-opus", TaskType::TextGeneration) => 0.98,
        ("claude-3-opus", TaskType::CodeGeneration) => 0.95,
        ("claude-3-opus", TaskType::Summarization) => 0.95,
        ("claude-3-sonnet", TaskType::TextGeneration) => 0.85,
        ("claude-3-sonnet", TaskType::CodeGeneration) => 0.80,
        ("claude-3-sonnet", TaskType::Summarization) => 0.90,
        ("gemini-pro", TaskType::TextGeneration) => 0.75,
        ("gemini-pro", TaskType::Summarization) => 0.70,
        _ => DEFAULT_QUALITY,
    }
}

pub struct Router {
    catalog: Arc<ProviderCatalog>,
    health: Arc<HealthTracker>,
    default_criteria: RoutingCriteria,
}

impl Router {
    pub fn new(catalog: Arc<ProviderCatalog>, health: Arc<HealthTracker>) -> Self {
        Self {
            catalog,
            health,
            default_criteria: RoutingCriteria::default(),
        }
    }

    pub fn with_criteria(
        catalog: Arc<ProviderCatalog>,
        health: Arc<HealthTracker>,
        default_criteria: RoutingCriteria,
    ) -> Self {
        Self {
            catalog,
            health,
            default_criteria,
        }
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// Weighted score of one descriptor for a profile. A descriptor that
    /// cannot hold the token estimate scores zero.
    pub fn score(
        &self,
        descriptor: &ProviderDescriptor,
        profile: &TaskProfile,
        criteria: &RoutingCriteria,
    ) -> f64 {
        if profile.token_estimate > descriptor.max_tokens {
            return 0.0;
        }

        let cost_score = 1.0 - (descriptor.cost_per_1k / COST_CEILING).min(1.0);
        let latency_score = 1.0 - (descriptor.avg_latency_ms as f64 / LATENCY_CEILING).min(1.0);
        let reliability_score = descriptor.reliability;
        let quality = quality_score(&descriptor.model, profile.task_type);

        criteria.cost_weight * cost_score
            + criteria.latency_weight * latency_score
            + criteria.reliability_weight * reliability_score
            + criteria.quality_weight * quality
    }

    fn eligible<'a>(
        &self,
        candidates: &'a [ProviderDescriptor],
        profile: &TaskProfile,
    ) -> Vec<&'a ProviderDescriptor> {
        candidates
            .iter()
            .filter(|d| d.has_capabilities(&profile.required_capabilities))
            .filter(|d| self.health.is_healthy(&d.name, &d.model))
            .filter(|d| profile.token_estimate <= d.max_tokens)
            .collect()
    }

    /// Select the primary descriptor and the ordered fallback chain.
    ///
    /// `pin` carries the caller's concrete (provider, model) when both are
    /// supplied. An eligible, healthy pin becomes the primary with
    /// confidence 1.0; an ineligible pin falls through to scoring and the
    /// substitution is recorded in the reasoning.
    pub fn select(
        &self,
        profile: &TaskProfile,
        pin: Option<(&str, &str)>,
        criteria: Option<RoutingCriteria>,
        preferred_providers: &[String],
    ) -> Result<RoutingResult, GatewayError> {
        let criteria = criteria.unwrap_or(self.default_criteria);
        criteria.validate()?;

        let candidates = self.catalog.for_task(profile.task_type);
        let eligible = self.eligible(candidates, profile);
        if eligible.is_empty() {
            return Err(GatewayError::NoSuitableProvider {
                task_type: profile.task_type.to_string(),
            });
        }

        // Score once, order deterministically: score descending, then the
        // caller's provider preference, then (name, model).
        let mut scored: Vec<(f64, &ProviderDescriptor)> = eligible
            .iter()
            .map(|d| (self.score(d, profile, &criteria), *d))
            .collect();
        scored.sort_by(|(sa, da), (sb, db)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let pa = preferred_providers.iter().any(|p| *p == da.name);
                    let pb = preferred_providers.iter().any(|p| *p == db.name);
                    pb.cmp(&pa)
                })
                .then_with(|| (&da.name, &da.model).cmp(&(&db.name, &db.model)))
        });

        if let Some((provider, model)) = pin {
            if let Some(pinned) = scored
                .iter()
                .find(|(_, d)| d.name == provider && d.model == model)
                .map(|(_, d)| *d)
            {
                let fallbacks: Vec<ProviderDescriptor> = scored
                    .iter()
                    .filter(|(_, d)| !(d.name == provider && d.model == model))
                    .take(MAX_FALLBACKS)
                    .map(|(_, d)| (*d).clone())
                    .collect();

                debug!(provider, model, "routing pinned by caller");
                return Ok(RoutingResult {
                    primary: pinned.clone(),
                    confidence: 1.0,
                    reasoning: "caller-pinned provider and model".to_string(),
                    fallbacks,
                });
            }
            // Pinned pair is unknown, unhealthy or over capacity: fall
            // through to scored selection and say so.
            let (top_score, top) = scored[0];
            let fallbacks = Self::fallbacks_after(&scored, top);
            let confidence = Self::confidence(&scored);
            debug!(
                pinned_provider = provider,
                pinned_model = model,
                selected = %top.key(),
                "pinned target ineligible, substituting"
            );
            return Ok(RoutingResult {
                primary: top.clone(),
                confidence,
                reasoning: format!(
                    "pinned {provider}/{model} ineligible or unhealthy; substituted {} ({})",
                    top.key(),
                    describe(top, profile.task_type, top_score),
                ),
                fallbacks,
            });
        }

        let (top_score, top) = scored[0];
        let fallbacks = Self::fallbacks_after(&scored, top);
        let confidence = Self::confidence(&scored);
        debug!(
            selected = %top.key(),
            score = top_score,
            confidence,
            task = %profile.task_type,
            "routing selected"
        );

        Ok(RoutingResult {
            primary: top.clone(),
            confidence,
            reasoning: format!(
                "selected for {}: {}",
                profile.task_type,
                describe(top, profile.task_type, top_score)
            ),
            fallbacks,
        })
    }

    /// Up to `MAX_FALLBACKS` next-ranked descriptors, never the primary.
    fn fallbacks_after(
        scored: &[(f64, &ProviderDescriptor)],
        primary: &ProviderDescriptor,
    ) -> Vec<ProviderDescriptor> {
        scored
            .iter()
            .filter(|(_, d)| d.key() != primary.key())
            .take(MAX_FALLBACKS)
            .map(|(_, d)| (*d).clone())
            .collect()
    }

    /// Confidence from the gap between the two best scores.
    fn confidence(scored: &[(f64, &ProviderDescriptor)]) -> f64 {
        if scored.len() <= 1 {
            return 1.0;
        }
        let gap = scored[0].0 - scored[1].0;
        (0.5 + gap).min(1.0)
    }
}

/// Short human-readable rationale from descriptor attributes.
fn describe(descriptor: &ProviderDescriptor, task: TaskType, score: f64) -> String {
    let mut reasons: Vec<&str> = Vec::new();
    if descriptor.cost_per_1k < 0.01 {
        reasons.push("cost-effective");
    }
    if descriptor.avg_latency_ms < 2000 {
        reasons.push("fast response");
    }
    if descriptor.reliability > 0.95 {
        reasons.push("high reliability");
    }
    if descriptor.max_tokens > 10_000 {
        reasons.push("large context window");
    }
    if quality_score(&descriptor.model, task) >= 0.9 {
        reasons.push("strong task quality");
    }
    if reasons.is_empty() {
        reasons.push("balanced performance");
    }
    format!("{} [score {:.3}]", reasons.join(", "), score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::classifier::classify;
    use crate::domain::config::GatewayConfigManifest;
    use crate::domain::provider::ModelPricing;
    use crate::domain::routing::QueryOptions;
    use std::time::Duration;

    fn descriptor(name: &str, model: &str, cost: f64, latency: u64, reliability: f64) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            model: model.into(),
            cost_per_1k: cost,
            pricing: ModelPricing::default(),
            avg_latency_ms: latency,
            reliability,
            max_tokens: 8000,
            capabilities: vec!["text-generation".into()],
        }
    }

    fn catalog_of(descriptors: Vec<ProviderDescriptor>) -> Arc<ProviderCatalog> {
        let mut catalog = ProviderCatalog::new();
        for d in descriptors {
            catalog.register(TaskType::TextGeneration, d);
        }
        Arc::new(catalog)
    }

    fn router(catalog: Arc<ProviderCatalog>) -> (Router, Arc<HealthTracker>) {
        let health = Arc::new(HealthTracker::new());
        (Router::new(catalog, health.clone()), health)
    }

    fn profile(prompt: &str) -> TaskProfile {
        classify(prompt, None, &QueryOptions::default())
    }

    #[test]
    fn selection_is_deterministic_under_equal_state() {
        let manifest = GatewayConfigManifest::default();
        let (router, _) = self::router(Arc::new(manifest.catalog()));
        let profile = profile("Tell me a story about the sea");

        let first = router.select(&profile, None, None, &[]).unwrap();
        for _ in 0..10 {
            let again = router.select(&profile, None, None, &[]).unwrap();
            assert_eq!(again.primary.key(), first.primary.key());
            let keys: Vec<String> = again.fallbacks.iter().map(|d| d.key()).collect();
            let first_keys: Vec<String> = first.fallbacks.iter().map(|d| d.key()).collect();
            assert_eq!(keys, first_keys);
        }
    }

    #[test]
    fn ties_break_lexicographically() {
        // Identical descriptors except identity: ordering must be stable
        // and alphabetical.
        let (router, _) = self::router(catalog_of(vec![
            descriptor("zeta", "m", 0.002, 1000, 0.9),
            descriptor("alpha", "m", 0.002, 1000, 0.9),
            descriptor("beta", "m", 0.002, 1000, 0.9),
        ]));
        let result = router.select(&profile("hi there"), None, None, &[]).unwrap();
        assert_eq!(result.primary.name, "alpha");
        let names: Vec<&str> = result.fallbacks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["beta", "zeta"]);
    }

    #[test]
    fn fallbacks_exclude_primary_and_cap_at_three() {
        let (router, _) = self::router(catalog_of(vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.002, 1000, 0.95),
            descriptor("c", "m3", 0.003, 1500, 0.93),
            descriptor("d", "m4", 0.004, 2000, 0.91),
            descriptor("e", "m5", 0.005, 2500, 0.89),
        ]));
        let result = router.select(&profile("hello"), None, None, &[]).unwrap();

        assert_eq!(result.fallbacks.len(), 3);
        assert!(result
            .fallbacks
            .iter()
            .all(|d| d.key() != result.primary.key()));
    }

    #[test]
    fn unhealthy_descriptors_are_ineligible() {
        let (router, health) = self::router(catalog_of(vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.002, 1000, 0.95),
        ]));

        // Open the circuit on the otherwise top-ranked candidate.
        for _ in 0..5 {
            health.update("a", "m1", false, Some("boom"));
        }

        let result = router.select(&profile("hello"), None, None, &[]).unwrap();
        assert_eq!(result.primary.name, "b");
        assert!(result.fallbacks.is_empty());
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn capability_requirements_filter_candidates() {
        let mut capable = descriptor("a", "m1", 0.02, 3000, 0.9);
        capable.capabilities.push("reasoning".into());
        let (router, _) = self::router(catalog_of(vec![
            capable,
            descriptor("b", "m2", 0.001, 500, 0.99),
        ]));

        let mut profile = profile("hello");
        profile.required_capabilities = vec!["reasoning".into()];

        let result = router.select(&profile, None, None, &[]).unwrap();
        assert_eq!(result.primary.name, "a");
    }

    #[test]
    fn oversized_prompts_exclude_small_models() {
        let mut small = descriptor("small", "m", 0.001, 500, 0.99);
        small.max_tokens = 10;
        let (router, _) = self::router(catalog_of(vec![
            small,
            descriptor("large", "m", 0.02, 3000, 0.9),
        ]));

        // ~26 tokens, over the small model's cap.
        let result = router
            .select(&profile(&"word ".repeat(20)), None, None, &[])
            .unwrap();
        assert_eq!(result.primary.name, "large");
    }

    #[test]
    fn no_eligible_candidates_fails() {
        let (router, health) = self::router(catalog_of(vec![descriptor(
            "a", "m1", 0.001, 500, 0.99,
        )]));
        for _ in 0..5 {
            health.update("a", "m1", false, None);
        }

        match router.select(&profile("hello"), None, None, &[]) {
            Err(GatewayError::NoSuitableProvider { task_type }) => {
                assert_eq!(task_type, "text-generation");
            }
            other => panic!("expected NoSuitableProvider, got {other:?}"),
        }
    }

    #[test]
    fn healthy_pin_wins_with_full_confidence() {
        let (router, _) = self::router(catalog_of(vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.02, 3000, 0.85),
        ]));

        let result = router
            .select(&profile("hello"), Some(("b", "m2")), None, &[])
            .unwrap();
        assert_eq!(result.primary.name, "b");
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.fallbacks.len(), 1);
        assert_eq!(result.fallbacks[0].name, "a");
    }

    #[test]
    fn unhealthy_pin_substitutes_and_says_so() {
        let (router, health) = self::router(catalog_of(vec![
            descriptor("a", "m1", 0.001, 500, 0.99),
            descriptor("b", "m2", 0.02, 3000, 0.85),
        ]));
        for _ in 0..5 {
            health.update("b", "m2", false, Some("down"));
        }

        let result = router
            .select(&profile("hello"), Some(("b", "m2")), None, &[])
            .unwrap();
        assert_eq!(result.primary.name, "a");
        assert!(result.reasoning.contains("b/m2"));
        assert!(result.reasoning.contains("substituted"));
    }

    #[test]
    fn invalid_weights_fail_before_selection() {
        let (router, _) = self::router(catalog_of(vec![descriptor(
            "a", "m1", 0.001, 500, 0.99,
        )]));
        let bad = RoutingCriteria {
            cost_weight: 0.5,
            latency_weight: 0.5,
            reliability_weight: 0.5,
            quality_weight: 0.1,
        };
        assert!(matches!(
            router.select(&profile("hello"), None, Some(bad), &[]),
            Err(GatewayError::InvalidWeights { .. })
        ));
    }

    #[test]
    fn score_components_follow_declared_attributes() {
        let (router, _) = self::router(catalog_of(vec![]));
        let profile = TaskProfile {
            task_type: TaskType::TextGeneration,
            complexity: 0.1,
            token_estimate: 100,
            priority: 3,
            max_budget: 0.05,
            required_capabilities: vec![],
            time_constraint: Duration::from_secs(30),
        };
        let criteria = RoutingCriteria::default();

        // Free, instant, perfectly reliable: score approaches
        // 0.3 + 0.3 + 0.3 + 0.1 * quality.
        let ideal = descriptor("x", "m", 0.0, 0, 1.0);
        let score = router.score(&ideal, &profile, &criteria);
        assert!((score - (0.9 + 0.1 * DEFAULT_QUALITY)).abs() < 1e-9);

        // At or beyond both ceilings, cost and latency contribute zero.
        let capped = descriptor("x", "m", 0.10, 10_000, 0.5);
        let score = router.score(&capped, &profile, &criteria);
        assert!((score - (0.3 * 0.5 + 0.1 * DEFAULT_QUALITY)).abs() < 1e-9);

        // Token overflow forces the score to zero.
        let mut tiny = descriptor("x", "m", 0.0, 0, 1.0);
        tiny.max_tokens = 10;
        let mut big_profile = profile.clone();
        big_profile.token_estimate = 11;
        assert_eq!(router.score(&tiny, &big_profile, &criteria), 0.0);
    }

    #[test]
    fn preferred_providers_break_ties_only() {
        let (router, _) = self::router(catalog_of(vec![
            descriptor("alpha", "m", 0.002, 1000, 0.9),
            descriptor("beta", "m", 0.002, 1000, 0.9),
        ]));

        let preferred = vec!["beta".to_string()];
        let result = router
            .select(&profile("hello"), None, None, &preferred)
            .unwrap();
        assert_eq!(result.primary.name, "beta");

        // A preference never outranks a better score.
        let (router, _) = self::router(catalog_of(vec![
            descriptor("alpha", "m", 0.001, 500, 0.99),
            descriptor("beta", "m", 0.04, 4000, 0.7),
        ]));
        let result = router
            .select(&profile("hello"), None, None, &preferred)
            .unwrap();
        assert_eq!(result.primary.name, "alpha");
    }
}
