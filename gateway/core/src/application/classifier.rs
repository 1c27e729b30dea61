// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Task Classification
//
// Turns a prompt plus caller options into a task profile. The heuristic is
// deliberately cheap: a keyword scan plus word-count statistics. A caller
// that already knows the task type passes it explicitly and skips
// detection.

use crate::domain::provider::TaskType;
use crate::domain::routing::{
    QueryOptions, TaskProfile, DEFAULT_MAX_BUDGET, DEFAULT_PRIORITY, DEFAULT_TIME_CONSTRAINT,
};

/// Words-per-token expansion factor for the rough token estimate.
const TOKEN_FACTOR: f64 = 1.3;

/// Keyword heuristic over the prompt. Defaults to text generation.
pub fn detect_task_type(prompt: &str) -> TaskType {
    let lower = prompt.to_lowercase();
    if lower.contains("classify") {
        TaskType::Classification
    } else if lower.contains("translate") {
        TaskType::Translation
    } else if lower.contains("summarize") || lower.contains("summarise") {
        TaskType::Summarization
    } else if lower.contains("code") || lower.contains("function") || lower.contains("implement") {
        TaskType::CodeGeneration
    } else {
        TaskType::TextGeneration
    }
}

/// Build the per-request task profile. `explicit` wins over detection.
pub fn classify(prompt: &str, explicit: Option<TaskType>, options: &QueryOptions) -> TaskProfile {
    let word_count = prompt.split_whitespace().count();

    TaskProfile {
        task_type: explicit.unwrap_or_else(|| detect_task_type(prompt)),
        complexity: (word_count as f64 / 1000.0).min(1.0),
        token_estimate: (word_count as f64 * TOKEN_FACTOR).ceil() as u32,
        priority: options.priority.unwrap_or(DEFAULT_PRIORITY).clamp(1, 5),
        max_budget: options.max_budget.unwrap_or(DEFAULT_MAX_BUDGET),
        required_capabilities: options.required_capabilities.clone(),
        time_constraint: options.time_constraint.unwrap_or(DEFAULT_TIME_CONSTRAINT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn keyword_detection_covers_closed_set() {
        assert_eq!(
            detect_task_type("Please classify this review as positive or negative"),
            TaskType::Classification
        );
        assert_eq!(
            detect_task_type("Translate this sentence to French"),
            TaskType::Translation
        );
        assert_eq!(
            detect_task_type("Summarize the following article"),
            TaskType::Summarization
        );
        assert_eq!(
            detect_task_type("Write a function that reverses a list"),
            TaskType::CodeGeneration
        );
        assert_eq!(
            detect_task_type("Tell me about the weather"),
            TaskType::TextGeneration
        );
    }

    #[test]
    fn explicit_type_wins_over_detection() {
        let profile = classify(
            "Translate this to German",
            Some(TaskType::Summarization),
            &QueryOptions::default(),
        );
        assert_eq!(profile.task_type, TaskType::Summarization);
    }

    #[test]
    fn complexity_saturates_at_one() {
        let short = classify("one two three", None, &QueryOptions::default());
        assert!((short.complexity - 0.003).abs() < 1e-9);

        let long_prompt = "word ".repeat(2000);
        let long = classify(&long_prompt, None, &QueryOptions::default());
        assert!((long.complexity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn token_estimate_rounds_up() {
        // 10 words * 1.3 = 13 tokens
        let profile = classify(
            "a b c d e f g h i j",
            None,
            &QueryOptions::default(),
        );
        assert_eq!(profile.token_estimate, 13);

        // 3 words * 1.3 = 3.9 -> 4
        let profile = classify("a b c", None, &QueryOptions::default());
        assert_eq!(profile.token_estimate, 4);
    }

    #[test]
    fn defaults_apply_without_options() {
        let profile = classify("hello there", None, &QueryOptions::default());
        assert_eq!(profile.priority, 3);
        assert!((profile.max_budget - 0.05).abs() < 1e-9);
        assert_eq!(profile.time_constraint, Duration::from_secs(30));
        assert!(profile.required_capabilities.is_empty());
    }

    #[test]
    fn options_override_defaults() {
        let options = QueryOptions {
            priority: Some(5),
            max_budget: Some(0.25),
            time_constraint: Some(Duration::from_secs(5)),
            required_capabilities: vec!["reasoning".into()],
            ..Default::default()
        };
        let profile = classify("hello", None, &options);
        assert_eq!(profile.priority, 5);
        assert!((profile.max_budget - 0.25).abs() < 1e-9);
        assert_eq!(profile.time_constraint, Duration::from_secs(5));
        assert_eq!(profile.required_capabilities, vec!["reasoning".to_string()]);
    }
}
