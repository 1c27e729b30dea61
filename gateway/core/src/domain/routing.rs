// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Routing Types
//
// The task profile is built fresh per request and discarded after routing.
// The routing result is ephemeral: the chosen descriptor, a confidence
// score, a human-readable rationale, and the ordered fallback chain.

use super::errors::GatewayError;
use super::provider::{ProviderDescriptor, TaskType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default caller budget in USD.
pub const DEFAULT_MAX_BUDGET: f64 = 0.05;
/// Default overall request deadline.
pub const DEFAULT_TIME_CONSTRAINT: Duration = Duration::from_secs(30);
/// Default request priority on the 1..=5 scale.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Analyzed characteristics of one request. Built by the classifier.
#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub task_type: TaskType,
    /// Word-count derived complexity in [0, 1].
    pub complexity: f64,
    pub token_estimate: u32,
    /// 1..=5, higher is more urgent.
    pub priority: u8,
    /// Maximum spend for this request in USD.
    pub max_budget: f64,
    pub required_capabilities: Vec<String>,
    pub time_constraint: Duration,
}

/// Scoring weights. Overridable per request; must sum to 1.0 ± 0.01.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingCriteria {
    pub cost_weight: f64,
    pub latency_weight: f64,
    pub reliability_weight: f64,
    pub quality_weight: f64,
}

impl Default for RoutingCriteria {
    fn default() -> Self {
        Self {
            cost_weight: 0.3,
            latency_weight: 0.3,
            reliability_weight: 0.3,
            quality_weight: 0.1,
        }
    }
}

impl RoutingCriteria {
    pub fn validate(&self) -> Result<(), GatewayError> {
        let sum = self.cost_weight
            + self.latency_weight
            + self.reliability_weight
            + self.quality_weight;
        if (sum - 1.0).abs() > 0.01 {
            return Err(GatewayError::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// Caller-supplied routing options, already parsed from the wire shape.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub criteria: Option<RoutingCriteria>,
    pub max_budget: Option<f64>,
    pub priority: Option<u8>,
    pub time_constraint: Option<Duration>,
    pub required_capabilities: Vec<String>,
    pub preferred_providers: Vec<String>,
}

/// The router's decision for one request.
#[derive(Debug, Clone)]
pub struct RoutingResult {
    /// The chosen descriptor.
    pub primary: ProviderDescriptor,
    /// Confidence in [0, 1]; 1.0 when the choice was unambiguous.
    pub confidence: f64,
    /// Short human-readable rationale.
    pub reasoning: String,
    /// Ordered fallback descriptors. Never contains the primary.
    pub fallbacks: Vec<ProviderDescriptor>,
}

impl RoutingResult {
    /// Primary followed by the fallback chain, in attempt order.
    pub fn candidates(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }
}
