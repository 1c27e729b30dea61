// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provider Health Tracking and Circuit Breaking
//!
//! Per-(provider, model) state machine shared across request tasks:
//!
//! ```text
//! +---------+  failure   +----------+  error_count >= T   +------+
//! | Healthy | ---------> | Degraded | ------------------> | Open |
//! +---------+            +----------+                     +------+
//!      ^                      |                               |
//!      |       success        |        quiet for Q            |
//!      +----------------------+-------------------------------+
//! ```
//!
//! A record older than the quarantine window reads as healthy, so the next
//! routed request acts as the probe: success closes the circuit, failure
//! re-stamps it Open. Absent records are healthy. Readers sit on the
//! scoring hot path and must stay cheap, hence a concurrent map with
//! per-entry locking and no global lock.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Consecutive failures before a circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Quarantine window after which an Open circuit is probed again.
pub const DEFAULT_QUARANTINE: Duration = Duration::from_secs(300);

/// Circuit state of one (provider, model) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Healthy,
    Degraded,
    Open,
}

impl CircuitState {
    /// Gauge encoding: 1 healthy, 0.5 degraded, 0 open.
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Healthy => 1.0,
            Self::Degraded => 0.5,
            Self::Open => 0.0,
        }
    }
}

/// Mutable health record for one (provider, model) pair.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub state: CircuitState,
    pub error_count: u32,
    pub last_checked: Instant,
    pub last_error: Option<String>,
}

impl HealthRecord {
    fn new() -> Self {
        Self {
            state: CircuitState::Healthy,
            error_count: 0,
            last_checked: Instant::now(),
            last_error: None,
        }
    }
}

/// Aggregate tracker for all (provider, model) pairs.
///
/// Records are created on first update and never removed; routing treats
/// absence as healthy.
pub struct HealthTracker {
    records: DashMap<String, HealthRecord>,
    failure_threshold: u32,
    quarantine: Duration,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_FAILURE_THRESHOLD, DEFAULT_QUARANTINE)
    }

    pub fn with_limits(failure_threshold: u32, quarantine: Duration) -> Self {
        Self {
            records: DashMap::new(),
            failure_threshold,
            quarantine,
        }
    }

    fn key(provider: &str, model: &str) -> String {
        format!("{provider}:{model}")
    }

    /// Whether routing may consider this pair. Open circuits older than
    /// the quarantine window read as healthy (optimistic probe).
    pub fn is_healthy(&self, provider: &str, model: &str) -> bool {
        match self.records.get(&Self::key(provider, model)) {
            None => true,
            Some(record) => {
                if record.last_checked.elapsed() > self.quarantine {
                    return true;
                }
                record.state != CircuitState::Open
            }
        }
    }

    /// Record the outcome of one attempt against this pair.
    pub fn update(&self, provider: &str, model: &str, success: bool, error: Option<&str>) {
        let key = Self::key(provider, model);
        let mut record = self.records.entry(key).or_insert_with(HealthRecord::new);
        record.last_checked = Instant::now();

        if success {
            if record.state == CircuitState::Open {
                info!(provider, model, "circuit closed after successful probe");
            }
            record.state = CircuitState::Healthy;
            record.error_count = 0;
            record.last_error = None;
            return;
        }

        record.error_count += 1;
        record.last_error = error.map(str::to_owned);

        let next = if record.error_count >= self.failure_threshold {
            CircuitState::Open
        } else {
            CircuitState::Degraded
        };
        if next == CircuitState::Open && record.state != CircuitState::Open {
            warn!(
                provider,
                model,
                error_count = record.error_count,
                "circuit opened"
            );
        }
        record.state = next;
    }

    /// Force a circuit open regardless of the error count. Used for
    /// failures that will not heal on their own, such as rejected
    /// credentials.
    pub fn mark_open(&self, provider: &str, model: &str, error: &str) {
        let key = Self::key(provider, model);
        let mut record = self.records.entry(key).or_insert_with(HealthRecord::new);
        record.last_checked = Instant::now();
        record.error_count = record.error_count.max(self.failure_threshold);
        record.last_error = Some(error.to_owned());
        if record.state != CircuitState::Open {
            warn!(provider, model, error, "circuit forced open");
        }
        record.state = CircuitState::Open;
    }

    /// Current state for gauges and the catalog listing.
    pub fn state(&self, provider: &str, model: &str) -> CircuitState {
        match self.records.get(&Self::key(provider, model)) {
            None => CircuitState::Healthy,
            Some(record) => {
                if record.last_checked.elapsed() > self.quarantine {
                    CircuitState::Healthy
                } else {
                    record.state
                }
            }
        }
    }

    pub fn record(&self, provider: &str, model: &str) -> Option<HealthRecord> {
        self.records
            .get(&Self::key(provider, model))
            .map(|r| r.clone())
    }

    pub fn snapshot(&self) -> Vec<(String, HealthRecord)> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
