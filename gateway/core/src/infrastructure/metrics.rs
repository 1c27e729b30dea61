// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway Metrics
//!
//! Counters, histograms and gauges for requests, latency, cost, cache and
//! provider health. Updates are atomic and fire-and-forget: nothing here
//! can fail a request. Rendered in Prometheus text exposition format at
//! `GET /metrics`.

use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Exponential latency buckets in seconds: 0.1, 0.2, ... 51.2.
fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    let mut buckets = Vec::with_capacity(count);
    let mut edge = start;
    for _ in 0..count {
        buckets.push(edge);
        edge *= factor;
    }
    buckets
}

/// A fixed-bucket histogram with atomic counters.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    total_count: AtomicU64,
    /// Sum in microseconds to keep the accumulator integral.
    sum_micros: AtomicU64,
}

impl Histogram {
    pub fn latency_default() -> Self {
        let buckets = exponential_buckets(0.1, 2.0, 10);
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            total_count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, seconds: f64) {
        for (i, edge) in self.buckets.iter().enumerate() {
            if seconds <= *edge {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.total_count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    fn render(&self, out: &mut String, name: &str, labels: &str) {
        for (i, edge) in self.buckets.iter().enumerate() {
            let count = self.counts[i].load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{labels},le=\"{edge}\"}} {count}");
        }
        let total = self.count();
        let _ = writeln!(out, "{name}_bucket{{{labels},le=\"+Inf\"}} {total}");
        let _ = writeln!(out, "{name}_sum{{{labels}}} {}", self.sum_seconds());
        let _ = writeln!(out, "{name}_count{{{labels}}} {total}");
    }
}

/// Atomic f64 accumulator (compare-and-swap on the bit pattern).
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn add(&self, value: f64) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestLabels {
    task: String,
    provider: String,
    model: String,
}

impl RequestLabels {
    fn render(&self) -> String {
        format!(
            "task_type=\"{}\",provider=\"{}\",model=\"{}\"",
            self.task, self.provider, self.model
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProviderLabels {
    provider: String,
    model: String,
}

impl ProviderLabels {
    fn render(&self) -> String {
        format!("provider=\"{}\",model=\"{}\"", self.provider, self.model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FailureLabels {
    provider: String,
    model: String,
    error_type: String,
}

impl FailureLabels {
    fn render(&self) -> String {
        format!(
            "provider=\"{}\",model=\"{}\",error_type=\"{}\"",
            self.provider, self.model, self.error_type
        )
    }
}

/// Process-wide metrics registry. One instance per gateway, initialized at
/// startup; request handlers treat every method as fire-and-forget.
#[derive(Debug, Default)]
pub struct MetricsSink {
    requests_total: DashMap<RequestLabels, AtomicU64>,
    cache_hits_total: DashMap<RequestLabels, AtomicU64>,
    failed_requests_total: DashMap<FailureLabels, AtomicU64>,
    cache_evictions_total: AtomicU64,
    cost_usd_total: DashMap<ProviderLabels, AtomicF64>,
    request_latency: DashMap<RequestLabels, Histogram>,
    provider_latency: DashMap<ProviderLabels, Histogram>,
    provider_health: DashMap<ProviderLabels, AtomicF64>,
    cache_size: AtomicU64,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the terminal metric for a completed request.
    pub fn record_request(
        &self,
        task: &str,
        provider: &str,
        model: &str,
        latency: Duration,
        cost: f64,
        cache_hit: bool,
    ) {
        let labels = RequestLabels {
            task: task.to_owned(),
            provider: provider.to_owned(),
            model: model.to_owned(),
        };

        self.requests_total
            .entry(labels.clone())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);

        if cache_hit {
            self.cache_hits_total
                .entry(labels.clone())
                .or_default()
                .fetch_add(1, Ordering::Relaxed);
        }

        self.request_latency
            .entry(labels)
            .or_insert_with(Histogram::latency_default)
            .observe(latency.as_secs_f64());

        if cost > 0.0 {
            self.cost_usd_total
                .entry(ProviderLabels {
                    provider: provider.to_owned(),
                    model: model.to_owned(),
                })
                .or_default()
                .add(cost);
        }
    }

    /// Record one provider-level or terminal failure.
    pub fn record_failure(&self, provider: &str, model: &str, error_type: &str) {
        self.failed_requests_total
            .entry(FailureLabels {
                provider: provider.to_owned(),
                model: model.to_owned(),
                error_type: error_type.to_owned(),
            })
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Observe one upstream attempt's latency.
    pub fn record_provider_latency(&self, provider: &str, model: &str, latency: Duration) {
        self.provider_latency
            .entry(ProviderLabels {
                provider: provider.to_owned(),
                model: model.to_owned(),
            })
            .or_insert_with(Histogram::latency_default)
            .observe(latency.as_secs_f64());
    }

    /// 1.0 healthy, 0.5 degraded, 0.0 open.
    pub fn set_provider_health(&self, provider: &str, model: &str, value: f64) {
        self.provider_health
            .entry(ProviderLabels {
                provider: provider.to_owned(),
                model: model.to_owned(),
            })
            .or_default()
            .set(value);
    }

    pub fn record_cache_eviction(&self) {
        self.cache_evictions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.store(size as u64, Ordering::Relaxed);
    }

    pub fn request_count(&self, task: &str, provider: &str, model: &str) -> u64 {
        self.requests_total
            .get(&RequestLabels {
                task: task.to_owned(),
                provider: provider.to_owned(),
                model: model.to_owned(),
            })
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn cache_hit_count(&self, task: &str, provider: &str, model: &str) -> u64 {
        self.cache_hits_total
            .get(&RequestLabels {
                task: task.to_owned(),
                provider: provider.to_owned(),
                model: model.to_owned(),
            })
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn failure_count(&self, provider: &str, model: &str, error_type: &str) -> u64 {
        self.failed_requests_total
            .get(&FailureLabels {
                provider: provider.to_owned(),
                model: model.to_owned(),
                error_type: error_type.to_owned(),
            })
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render the registry in Prometheus text exposition format.
    /// Lines are sorted per metric for stable output.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(4096);

        let mut lines: Vec<String> = self
            .requests_total
            .iter()
            .map(|e| {
                format!(
                    "conduit_requests_total{{{}}} {}",
                    e.key().render(),
                    e.value().load(Ordering::Relaxed)
                )
            })
            .collect();
        lines.sort();
        out.push_str("# TYPE conduit_requests_total counter\n");
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }

        let mut lines: Vec<String> = self
            .cache_hits_total
            .iter()
            .map(|e| {
                format!(
                    "conduit_cache_hits_total{{{}}} {}",
                    e.key().render(),
                    e.value().load(Ordering::Relaxed)
                )
            })
            .collect();
        lines.sort();
        out.push_str("# TYPE conduit_cache_hits_total counter\n");
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }

        let mut lines: Vec<String> = self
            .failed_requests_total
            .iter()
            .map(|e| {
                format!(
                    "conduit_failed_requests_total{{{}}} {}",
                    e.key().render(),
                    e.value().load(Ordering::Relaxed)
                )
            })
            .collect();
        lines.sort();
        out.push_str("# TYPE conduit_failed_requests_total counter\n");
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }

        out.push_str("# TYPE conduit_cache_evictions_total counter\n");
        let _ = writeln!(
            out,
            "conduit_cache_evictions_total {}",
            self.cache_evictions_total.load(Ordering::Relaxed)
        );

        let mut lines: Vec<String> = self
            .cost_usd_total
            .iter()
            .map(|e| {
                format!(
                    "conduit_cost_usd_total{{{}}} {}",
                    e.key().render(),
                    e.value().get()
                )
            })
            .collect();
        lines.sort();
        out.push_str("# TYPE conduit_cost_usd_total counter\n");
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }

        out.push_str("# TYPE conduit_request_latency_seconds histogram\n");
        let mut entries: Vec<(String, String)> = Vec::new();
        for e in self.request_latency.iter() {
            let mut block = String::new();
            e.value()
                .render(&mut block, "conduit_request_latency_seconds", &e.key().render());
            entries.push((e.key().render(), block));
        }
        entries.sort();
        for (_, block) in entries {
            out.push_str(&block);
        }

        out.push_str("# TYPE conduit_provider_latency_seconds histogram\n");
        let mut entries: Vec<(String, String)> = Vec::new();
        for e in self.provider_latency.iter() {
            let mut block = String::new();
            e.value()
                .render(&mut block, "conduit_provider_latency_seconds", &e.key().render());
            entries.push((e.key().render(), block));
        }
        entries.sort();
        for (_, block) in entries {
            out.push_str(&block);
        }

        let mut lines: Vec<String> = self
            .provider_health
            .iter()
            .map(|e| {
                format!(
                    "conduit_provider_health{{{}}} {}",
                    e.key().render(),
                    e.value().get()
                )
            })
            .collect();
        lines.sort();
        out.push_str("# TYPE conduit_provider_health gauge\n");
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }

        out.push_str("# TYPE conduit_cache_size gauge\n");
        let _ = writeln!(
            out,
            "conduit_cache_size {}",
            self.cache_size.load(Ordering::Relaxed)
        );

        out
    }
}
