// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Streaming Channel
//!
//! The server-sent variant of the executor: same validation, same routing,
//! same health updates, no cache. Chunks flow through an mpsc channel so
//! the HTTP layer can frame them as SSE events. A provider that fails
//! mid-stream ends the stream with an error event; partial output is
//! surfaced, never silently swapped for another provider's.

use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::application::classifier::classify;
use crate::application::executor::QueryRequest;
use crate::application::router::Router;
use crate::domain::completion::{ChunkStream, CompletionRequest, StreamChunk};
use crate::domain::errors::GatewayError;
use crate::domain::provider::ProviderDescriptor;
use crate::infrastructure::health::HealthTracker;
use crate::infrastructure::metrics::MetricsSink;
use crate::infrastructure::AdapterRegistry;

const CHANNEL_CAPACITY: usize = 64;
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const LATENCY_SLACK: u64 = 3;

pub struct StreamingChannel {
    registry: Arc<AdapterRegistry>,
    router: Arc<Router>,
    health: Arc<HealthTracker>,
    metrics: Arc<MetricsSink>,
}

impl StreamingChannel {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        router: Arc<Router>,
        health: Arc<HealthTracker>,
        metrics: Arc<MetricsSink>,
    ) -> Self {
        Self {
            registry,
            router,
            health,
            metrics,
        }
    }

    /// Open a chunk stream for one request. Candidates are tried in
    /// routing order until one stream starts; after the first chunk there
    /// is no provider substitution.
    pub async fn stream(&self, request: QueryRequest) -> Result<ChunkStream, GatewayError> {
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

        let profile = classify(&request.prompt, request.task_type, &request.options);
        let deadline = Instant::now() + profile.time_constraint;

        let pin = match (&request.provider, &request.model) {
            (Some(provider), Some(model)) => Some((provider.as_str(), model.as_str())),
            _ => None,
        };
        let routing = self.router.select(
            &profile,
            pin,
            request.options.criteria,
            &request.options.preferred_providers,
        )?;

        let candidates: Vec<ProviderDescriptor> = routing.candidates().cloned().collect();
        let task_label = profile.task_type.as_str().to_string();
        let mut last_error: Option<GatewayError> = None;

        for descriptor in &candidates {
            if Instant::now() >= deadline {
                break;
            }

            let adapter = match self.registry.get(&descriptor.name) {
                Ok(adapter) => adapter,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let completion = CompletionRequest {
                model: descriptor.model.clone(),
                prompt: request.prompt.clone(),
                max_tokens: request.max_tokens,
                pricing: descriptor.pricing,
                options: Default::default(),
            };

            if adapter.supports_streaming() {
                match adapter.chat_completion_stream(&completion).await {
                    Ok(upstream) => {
                        debug!(provider = %descriptor.name, model = %descriptor.model, "stream opened");
                        return Ok(self.forward(upstream, descriptor.clone(), task_label));
                    }
                    Err(e) => {
                        self.note_failure(descriptor, &e);
                        last_error = Some(e);
                        continue;
                    }
                }
            }

            // No native streaming: run the unary call and deliver the full
            // response as one synthetic chunk plus a terminal event.
            let remaining = deadline.saturating_duration_since(Instant::now());
            let attempt_budget = remaining
                .min(Duration::from_millis(
                    descriptor.avg_latency_ms.saturating_mul(LATENCY_SLACK),
                ))
                .min(MAX_ATTEMPT_TIMEOUT);

            match tokio::time::timeout(attempt_budget, adapter.chat_completion(&completion)).await {
                Ok(Ok(response)) => {
                    self.health
                        .update(&descriptor.name, &descriptor.model, true, None);
                    self.metrics.record_request(
                        &task_label,
                        &response.provider,
                        &response.model,
                        response.latency,
                        response.cost,
                        false,
                    );

                    let (tx, rx) = mpsc::channel(2);
                    let content = response.content;
                    tokio::spawn(async move {
                        let _ = tx
                            .send(Ok(StreamChunk {
                                delta: content,
                                finish_reason: None,
                            }))
                            .await;
                        let _ = tx
                            .send(Ok(StreamChunk {
                                delta: String::new(),
                                finish_reason: Some("stop".to_string()),
                            }))
                            .await;
                    });
                    return Ok(Box::pin(ReceiverStream::new(rx)));
                }
                Ok(Err(e)) => {
                    self.note_failure(descriptor, &e);
                    if !e.advances_fallback() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
                Err(_elapsed) => {
                    let e = GatewayError::Timeout {
                        provider: descriptor.name.clone(),
                        model: descriptor.model.clone(),
                        elapsed_ms: attempt_budget.as_millis() as u64,
                    };
                    self.note_failure(descriptor, &e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(inner) => {
                let (provider, model) = inner
                    .target()
                    .map(|(p, m)| (p.to_string(), m.to_string()))
                    .unwrap_or_default();
                Err(GatewayError::AllProvidersFailed {
                    provider,
                    model,
                    source: Box::new(inner),
                })
            }
            None => Err(GatewayError::DeadlineExceeded),
        }
    }

    /// Forward a native upstream stream through a channel, folding the
    /// outcome into health and metrics when it ends.
    fn forward(
        &self,
        mut upstream: ChunkStream,
        descriptor: ProviderDescriptor,
        task_label: String,
    ) -> ChunkStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let health = self.health.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut failed = false;

            while let Some(item) = upstream.next().await {
                let is_err = item.is_err();
                if tx.send(item).await.is_err() {
                    // Receiver dropped: the caller went away, stop reading.
                    return;
                }
                if is_err {
                    failed = true;
                    break;
                }
            }

            if failed {
                warn!(provider = %descriptor.name, model = %descriptor.model, "stream failed mid-flight");
                health.update(&descriptor.name, &descriptor.model, false, Some("stream error"));
                metrics.record_failure(&descriptor.name, &descriptor.model, "stream_error");
            } else {
                health.update(&descriptor.name, &descriptor.model, true, None);
                metrics.record_request(
                    &task_label,
                    &descriptor.name,
                    &descriptor.model,
                    started.elapsed(),
                    0.0,
                    false,
                );
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    fn note_failure(&self, descriptor: &ProviderDescriptor, error: &GatewayError) {
        let message = error.to_string();
        if matches!(error, GatewayError::Auth { .. }) {
            self.health
                .mark_open(&descriptor.name, &descriptor.model, &message);
        } else {
            self.health
                .update(&descriptor.name, &descriptor.model, false, Some(&message));
        }
        self.metrics
            .record_failure(&descriptor.name, &descriptor.model, error.error_type());
    }
}
