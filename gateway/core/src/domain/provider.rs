// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Catalog - Descriptors and Task Types
//
// A descriptor is the declared identity, economics and performance of one
// (provider, model) pair. Descriptors are immutable configuration: routing
// reads them on every request, only admin reconfiguration replaces them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of task categories the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    TextGeneration,
    Classification,
    Translation,
    Summarization,
    CodeGeneration,
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::TextGeneration,
        TaskType::Classification,
        TaskType::Translation,
        TaskType::Summarization,
        TaskType::CodeGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text-generation",
            Self::Classification => "classification",
            Self::Translation => "translation",
            Self::Summarization => "summarization",
            Self::CodeGeneration => "code-generation",
        }
    }

    /// Parse a wire-format task type. Unknown strings are rejected;
    /// callers that want a default use `unwrap_or_default()` on the Option.
    pub fn parse(s: &str) -> Option<TaskType> {
        match s {
            "text-generation" => Some(Self::TextGeneration),
            "classification" => Some(Self::Classification),
            "translation" => Some(Self::Translation),
            "summarization" => Some(Self::Summarization),
            "code-generation" => Some(Self::CodeGeneration),
            _ => None,
        }
    }
}

impl Default for TaskType {
    fn default() -> Self {
        Self::TextGeneration
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split per-token pricing used for cost accounting.
/// The blended `cost_per_1k` on the descriptor is the scoring input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    /// USD per 1,000 prompt tokens.
    pub prompt_per_1k: f64,
    /// USD per 1,000 completion tokens.
    pub completion_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        f64::from(prompt_tokens) * self.prompt_per_1k / 1000.0
            + f64::from(completion_tokens) * self.completion_per_1k / 1000.0
    }
}

/// Declared characteristics of one (provider, model) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider identifier, e.g. "openai".
    pub name: String,

    /// Model identifier, e.g. "gpt-4".
    pub model: String,

    /// Blended USD per 1,000 tokens, used by the scorer.
    pub cost_per_1k: f64,

    /// Per-token pricing used by adapters for cost accounting.
    #[serde(default)]
    pub pricing: ModelPricing,

    /// Declared average latency in milliseconds.
    pub avg_latency_ms: u64,

    /// Declared reliability in [0, 1].
    pub reliability: f64,

    /// Maximum tokens the model accepts.
    pub max_tokens: u32,

    /// Capability tags, e.g. "text-generation", "reasoning", "code".
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ProviderDescriptor {
    /// Stable key used by health tracking and metrics labels.
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.model)
    }

    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|cap| self.capabilities.iter().any(|c| c == cap))
    }
}

/// Descriptors indexed by the task types they are registered to serve.
///
/// Built once at startup from configuration. Lookups for a task type with
/// no registrations fall back to the text-generation set.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    by_task: HashMap<TaskType, Vec<ProviderDescriptor>>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: TaskType, descriptor: ProviderDescriptor) {
        self.by_task.entry(task).or_default().push(descriptor);
    }

    /// Candidates registered for a task type, falling back to the
    /// text-generation set when the type has no registrations.
    pub fn for_task(&self, task: TaskType) -> &[ProviderDescriptor] {
        match self.by_task.get(&task) {
            Some(descriptors) if !descriptors.is_empty() => descriptors,
            _ => self
                .by_task
                .get(&TaskType::TextGeneration)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// Find a specific (provider, model) pair across all task types.
    pub fn find(&self, provider: &str, model: &str) -> Option<&ProviderDescriptor> {
        self.by_task
            .values()
            .flatten()
            .find(|d| d.name == provider && d.model == model)
    }

    /// All distinct descriptors, ordered by (name, model).
    pub fn all(&self) -> Vec<&ProviderDescriptor> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<&ProviderDescriptor> = self
            .by_task
            .values()
            .flatten()
            .filter(|d| seen.insert(d.key()))
            .collect();
        out.sort_by(|a, b| (&a.name, &a.model).cmp(&(&b.name, &b.model)));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, model: &str) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            model: model.into(),
            cost_per_1k: 0.002,
            pricing: ModelPricing {
                prompt_per_1k: 0.001,
                completion_per_1k: 0.002,
            },
            avg_latency_ms: 1000,
            reliability: 0.9,
            max_tokens: 4000,
            capabilities: vec!["text-generation".into()],
        }
    }

    #[test]
    fn unknown_task_falls_back_to_text_generation() {
        let mut catalog = ProviderCatalog::new();
        catalog.register(TaskType::TextGeneration, descriptor("openai", "gpt-3.5-turbo"));

        let candidates = catalog.for_task(TaskType::Translation);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model, "gpt-3.5-turbo");
    }

    #[test]
    fn capability_check_requires_superset() {
        let mut d = descriptor("openai", "gpt-4");
        d.capabilities = vec!["text-generation".into(), "reasoning".into()];

        assert!(d.has_capabilities(&["reasoning".to_string()]));
        assert!(!d.has_capabilities(&["vision".to_string()]));
        assert!(d.has_capabilities(&[]));
    }

    #[test]
    fn pricing_is_per_token() {
        let pricing = ModelPricing {
            prompt_per_1k: 0.03,
            completion_per_1k: 0.06,
        };
        let cost = pricing.cost(1000, 500);
        assert!((cost - 0.06).abs() < 1e-9);
    }

    #[test]
    fn task_type_round_trips_wire_format() {
        for task in TaskType::ALL {
            assert_eq!(TaskType::parse(task.as_str()), Some(task));
        }
        assert_eq!(TaskType::parse("poetry"), None);
    }
}
