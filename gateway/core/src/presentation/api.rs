// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP Surface
//
// Thin axum layer over the executor and streaming channel. Auth, rate
// limiting and CORS live in middleware outside this crate; handlers here
// only translate between the wire shapes and the application services.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use chrono::Utc;
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::application::{Executor, QueryRequest, StreamingChannel};
use crate::domain::errors::GatewayError;
use crate::domain::provider::{ProviderCatalog, TaskType};
use crate::domain::routing::{QueryOptions, RoutingCriteria};
use crate::infrastructure::health::HealthTracker;
use crate::infrastructure::metrics::MetricsSink;

pub struct AppState {
    pub executor: Arc<Executor>,
    pub streaming: Arc<StreamingChannel>,
    pub catalog: Arc<ProviderCatalog>,
    pub health: Arc<HealthTracker>,
    pub metrics: Arc<MetricsSink>,
}

pub fn app(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/v1/query", post(ai_query))
        .route("/v1/query/stream", post(ai_query_stream))
        .route("/v1/providers", get(list_providers))
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AiQueryRequest {
    pub prompt: String,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub options: Option<AiQueryOptions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiQueryOptions {
    pub cost_weight: Option<f64>,
    pub latency_weight: Option<f64>,
    pub reliability_weight: Option<f64>,
    pub quality_weight: Option<f64>,
    pub max_budget: Option<f64>,
    pub priority: Option<u8>,
    #[serde(default)]
    pub preferred_providers: Vec<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    pub time_constraint_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct AiQueryResponse {
    pub id: String,
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: TokensUsed,
    pub cost: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub timestamp: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct TokensUsed {
    pub input: u32,
    pub output: u32,
}

fn parse_request(wire: AiQueryRequest) -> Result<QueryRequest, GatewayError> {
    let task_type = match wire.task_type.as_deref() {
        None | Some("") => None,
        Some(s) => Some(TaskType::parse(s).ok_or_else(|| {
            GatewayError::InvalidRequest(format!("unknown task_type '{s}'"))
        })?),
    };

    let options = wire.options.unwrap_or_default();
    let criteria = match (
        options.cost_weight,
        options.latency_weight,
        options.reliability_weight,
        options.quality_weight,
    ) {
        (None, None, None, None) => None,
        (Some(cost), Some(latency), Some(reliability), Some(quality)) => Some(RoutingCriteria {
            cost_weight: cost,
            latency_weight: latency,
            reliability_weight: reliability,
            quality_weight: quality,
        }),
        _ => {
            return Err(GatewayError::InvalidRequest(
                "all four routing weights must be supplied together".into(),
            ))
        }
    };

    Ok(QueryRequest {
        prompt: wire.prompt,
        task_type,
        provider: wire.provider,
        model: wire.model,
        max_tokens: wire.max_tokens,
        options: QueryOptions {
            criteria,
            max_budget: options.max_budget,
            priority: options.priority,
            time_constraint: options.time_constraint_ms.map(Duration::from_millis),
            required_capabilities: options.required_capabilities,
            preferred_providers: options.preferred_providers,
        },
    })
}

fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::InvalidRequest(_) | GatewayError::InvalidWeights { .. } => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
        GatewayError::UnknownProvider(_) => StatusCode::NOT_FOUND,
        GatewayError::NoSuitableProvider { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::DeadlineExceeded | GatewayError::Timeout { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        GatewayError::Cancelled => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn error_body(error: &GatewayError) -> Json<serde_json::Value> {
    Json(json!({
        "error": error.to_string(),
        "error_type": error.error_type(),
    }))
}

// ============================================================================
// Handlers
// ============================================================================

async fn ai_query(
    State(state): State<Arc<AppState>>,
    Json(wire): Json<AiQueryRequest>,
) -> impl IntoResponse {
    let request = match parse_request(wire) {
        Ok(request) => request,
        Err(e) => return (status_for(&e), error_body(&e)).into_response(),
    };

    match state.executor.execute(request).await {
        Ok(outcome) => {
            let response = AiQueryResponse {
                id: Uuid::new_v4().to_string(),
                content: outcome.response.content,
                provider: outcome.response.provider,
                model: outcome.response.model,
                tokens_used: TokensUsed {
                    input: outcome.response.usage.input,
                    output: outcome.response.usage.output,
                },
                cost: outcome.response.cost,
                latency_ms: outcome.response.latency.as_millis() as u64,
                cache_hit: outcome.cache_hit,
                timestamp: Utc::now(),
                metadata: outcome.response.metadata,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => (status_for(&e), error_body(&e)).into_response(),
    }
}

async fn ai_query_stream(
    State(state): State<Arc<AppState>>,
    Json(wire): Json<AiQueryRequest>,
) -> impl IntoResponse {
    let request = match parse_request(wire) {
        Ok(request) => request,
        Err(e) => return (status_for(&e), error_body(&e)).into_response(),
    };

    match state.streaming.stream(request).await {
        Ok(chunks) => {
            let events: Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>> =
                Box::pin(chunks.map(|item| {
                    let payload = match item {
                        Ok(chunk) => serde_json::to_string(&chunk).unwrap_or_default(),
                        Err(e) => json!({
                            "error": e.to_string(),
                            "error_type": e.error_type(),
                        })
                        .to_string(),
                    };
                    Ok(Event::default().data(payload))
                }));
            Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(e) => (status_for(&e), error_body(&e)).into_response(),
    }
}

async fn list_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let providers: Vec<serde_json::Value> = state
        .catalog
        .all()
        .into_iter()
        .map(|d| {
            let health_state = state.health.state(&d.name, &d.model);
            json!({
                "name": d.name,
                "model": d.model,
                "cost_per_1k": d.cost_per_1k,
                "avg_latency_ms": d.avg_latency_ms,
                "reliability": d.reliability,
                "max_tokens": d.max_tokens,
                "capabilities": d.capabilities,
                "healthy": health_state != crate::infrastructure::CircuitState::Open,
            })
        })
        .collect();

    Json(json!({ "providers": providers }))
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.metrics.render(),
    )
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
