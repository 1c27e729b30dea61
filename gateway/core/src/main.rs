// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Conduit Gateway Daemon
//!
//! Boots the gateway: configuration discovery, provider registry, cache
//! backend, health tracker, metrics, then the HTTP surface.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use conduit_core::application::{Executor, Router, StreamingChannel};
use conduit_core::domain::cache::ResponseCache;
use conduit_core::domain::config::GatewayConfigManifest;
use conduit_core::infrastructure::adapters::LayeredCredentialResolver;
use conduit_core::infrastructure::{
    AdapterRegistry, HealthTracker, MemoryCache, MetricsSink, ProviderStore, RedisCache,
};
use conduit_core::presentation::{app, AppState};

/// Conduit - intelligent LLM gateway
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, env = "CONDUIT_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bind address override
    #[arg(long, env = "CONDUIT_HOST")]
    host: Option<String>,

    /// HTTP port override
    #[arg(long, env = "CONDUIT_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CONDUIT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = GatewayConfigManifest::load_or_default(cli.config)?;
    config.validate().context("invalid configuration")?;

    let metrics = Arc::new(MetricsSink::new());
    let health = Arc::new(HealthTracker::new());

    let store = match &config.spec.database {
        Some(db) => match ProviderStore::connect(&db.url).await {
            Ok(store) => {
                info!("provider configuration store connected");
                Some(Arc::new(store))
            }
            Err(e) => {
                warn!(error = %e, "provider store unreachable, using environment credentials");
                None
            }
        },
        None => None,
    };

    if std::env::var("PROVIDER_SECRET_KEY").is_err() {
        info!("PROVIDER_SECRET_KEY not set, encrypted credential reads disabled");
    }
    let credentials = Arc::new(LayeredCredentialResolver::new(store));

    let registry = Arc::new(AdapterRegistry::from_config(&config.spec, credentials));
    let catalog = Arc::new(config.catalog());
    if catalog.is_empty() {
        anyhow::bail!("no providers configured");
    }

    let cache: Arc<dyn ResponseCache> = match config.spec.cache.backend.as_str() {
        "redis" => {
            let url = config
                .spec
                .cache
                .url
                .as_deref()
                .context("cache.url required for redis backend")?;
            info!(url, "using redis response cache");
            Arc::new(RedisCache::new(url)?)
        }
        _ => {
            info!("using in-memory response cache");
            Arc::new(MemoryCache::with_metrics(metrics.clone()))
        }
    };

    let router = Arc::new(Router::with_criteria(
        catalog.clone(),
        health.clone(),
        config.spec.routing,
    ));
    let executor = Arc::new(Executor::new(
        registry.clone(),
        router.clone(),
        cache,
        health.clone(),
        metrics.clone(),
        config.spec.cache.ttl(),
    ));
    let streaming = Arc::new(StreamingChannel::new(
        registry,
        router,
        health.clone(),
        metrics.clone(),
    ));

    let state = Arc::new(AppState {
        executor,
        streaming,
        catalog,
        health,
        metrics,
    });

    let host = cli
        .host
        .unwrap_or_else(|| config.spec.network.bind_address.clone());
    let port = cli.port.unwrap_or(config.spec.network.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "conduit gateway listening");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
