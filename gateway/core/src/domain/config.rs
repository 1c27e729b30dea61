// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for Conduit gateway nodes, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Provider catalog (descriptors with pricing, latency, reliability)
// - Cache backend selection and TTL
// - Default routing weights
// - Network and database settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::provider::{ModelPricing, ProviderCatalog, ProviderDescriptor, TaskType};
use super::routing::RoutingCriteria;

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    /// Node metadata (name, labels, version)
    pub metadata: ManifestMetadata,

    /// Gateway configuration specification
    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name (unique identifier)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    /// Upstream provider endpoints and their model catalog
    #[serde(default)]
    pub providers: Vec<ProviderEndpointConfig>,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Default routing weights (overridable per request)
    #[serde(default)]
    pub routing: RoutingCriteria,

    /// HTTP binding
    #[serde(default)]
    pub network: NetworkConfig,

    /// Provider configuration store (optional; env credentials only without it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    /// Unique provider name (e.g. "openai", "anthropic", "gemini")
    pub name: String,

    /// API base URL
    pub base_url: String,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Models served by this provider
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model identifier for the provider API
    pub model: String,

    /// Blended USD per 1,000 tokens (scoring input)
    pub cost_per_1k: f64,

    /// Split per-token pricing (cost accounting)
    #[serde(default)]
    pub pricing: ModelPricing,

    /// Declared average latency in milliseconds
    pub avg_latency_ms: u64,

    /// Declared reliability in [0, 1]
    pub reliability: f64,

    /// Maximum tokens the model accepts
    pub max_tokens: u32,

    /// Capability tags
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Task types this model is registered for
    #[serde(default = "default_task_types")]
    pub task_types: Vec<TaskType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// "memory" or "redis"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Redis connection URL (redis backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Per-entry TTL in seconds
    #[serde(default = "default_cache_expiration")]
    pub expiration_seconds: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            url: None,
            expiration_seconds: default_cache_expiration(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub url: String,
}

fn default_true() -> bool {
    true
}

fn default_cache_backend() -> String {
    "memory".to_string()
}

fn default_cache_expiration() -> u64 {
    3600
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_task_types() -> Vec<TaskType> {
    vec![TaskType::TextGeneration]
}

impl Default for GatewayConfigSpec {
    fn default() -> Self {
        Self {
            providers: default_provider_catalog(),
            cache: CacheConfig::default(),
            routing: RoutingCriteria::default(),
            network: NetworkConfig::default(),
            database: None,
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "conduit-node".to_string());

        Self {
            api_version: "100monkeys.ai/v1".to_string(),
            kind: "GatewayConfig".to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

/// Built-in catalog mirroring the providers the gateway ships adapters for.
/// Deployments override this in the manifest.
fn default_provider_catalog() -> Vec<ProviderEndpointConfig> {
    vec![
        ProviderEndpointConfig {
            name: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            enabled: true,
            models: vec![
                ModelEntry {
                    model: "gpt-4".into(),
                    cost_per_1k: 0.03,
                    pricing: ModelPricing {
                        prompt_per_1k: 0.03,
                        completion_per_1k: 0.06,
                    },
                    avg_latency_ms: 2000,
                    reliability: 0.95,
                    max_tokens: 8000,
                    capabilities: vec![
                        "text-generation".into(),
                        "reasoning".into(),
                        "code".into(),
                    ],
                    task_types: vec![TaskType::TextGeneration, TaskType::CodeGeneration],
                },
                ModelEntry {
                    model: "gpt-3.5-turbo".into(),
                    cost_per_1k: 0.002,
                    pricing: ModelPricing {
                        prompt_per_1k: 0.001,
                        completion_per_1k: 0.002,
                    },
                    avg_latency_ms: 1000,
                    reliability: 0.90,
                    max_tokens: 4000,
                    capabilities: vec!["text-generation".into(), "conversation".into()],
                    task_types: vec![
                        TaskType::TextGeneration,
                        TaskType::Summarization,
                        TaskType::Classification,
                        TaskType::Translation,
                    ],
                },
            ],
        },
        ProviderEndpointConfig {
            name: "anthropic".into(),
            base_url: "https://api.anthropic.com/v1".into(),
            enabled: true,
            models: vec![
                ModelEntry {
                    model: "claude-3-opus".into(),
                    cost_per_1k: 0.015,
                    pricing: ModelPricing {
                        prompt_per_1k: 0.015,
                        completion_per_1k: 0.075,
                    },
                    avg_latency_ms: 3000,
                    reliability: 0.98,
                    max_tokens: 200_000,
                    capabilities: vec![
                        "text-generation".into(),
                        "reasoning".into(),
                        "analysis".into(),
                    ],
                    task_types: vec![TaskType::TextGeneration, TaskType::CodeGeneration],
                },
                ModelEntry {
                    model: "claude-3-sonnet".into(),
                    cost_per_1k: 0.003,
                    pricing: ModelPricing {
                        prompt_per_1k: 0.003,
                        completion_per_1k: 0.015,
                    },
                    avg_latency_ms: 1500,
                    reliability: 0.95,
                    max_tokens: 200_000,
                    capabilities: vec![
                        "text-generation".into(),
                        "conversation".into(),
                        "analysis".into(),
                    ],
                    task_types: vec![TaskType::TextGeneration, TaskType::Summarization],
                },
            ],
        },
        ProviderEndpointConfig {
            name: "gemini".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            enabled: true,
            models: vec![ModelEntry {
                model: "gemini-pro".into(),
                cost_per_1k: 0.001,
                pricing: ModelPricing {
                    prompt_per_1k: 0.0005,
                    completion_per_1k: 0.0015,
                },
                avg_latency_ms: 2500,
                reliability: 0.85,
                max_tokens: 30_000,
                capabilities: vec!["text-generation".into(), "multimodal".into()],
                task_types: vec![TaskType::TextGeneration],
            }],
        },
    ]
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONDUIT_CONFIG_PATH environment variable
    /// 2. ./conduit-config.yaml (working directory)
    /// 3. ~/.conduit/config.yaml (user home)
    /// 4. /etc/conduit/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONDUIT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./conduit-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".conduit").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/conduit/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to built-in defaults
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found, using built-in provider catalog");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides. Allows container deployments
    /// to swap the cache backend without editing the manifest.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CACHE_TYPE") {
            match val.as_str() {
                "memory" | "redis" => {
                    tracing::info!("Environment override: CACHE_TYPE={}", val);
                    self.spec.cache.backend = val;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for CACHE_TYPE: '{}'. Expected memory/redis. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("CACHE_EXPIRATION") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    tracing::info!("Environment override: CACHE_EXPIRATION={}s", secs);
                    self.spec.cache.expiration_seconds = secs;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for CACHE_EXPIRATION: '{}'. Expected seconds. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            self.spec.cache.url = Some(url);
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.spec.database = Some(DatabaseConfig { url });
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != "100monkeys.ai/v1" {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '100monkeys.ai/v1'",
                self.api_version
            );
        }

        if self.kind != "GatewayConfig" {
            anyhow::bail!("Invalid kind: '{}'. Must be 'GatewayConfig'", self.kind);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for provider in &self.spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }

            if provider.base_url.is_empty() {
                anyhow::bail!("Provider base_url cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("Provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty in provider: {}", provider.name);
                }
                if !(0.0..=1.0).contains(&model.reliability) {
                    anyhow::bail!(
                        "Reliability for {}/{} must be in [0, 1]",
                        provider.name,
                        model.model
                    );
                }
            }
        }

        self.spec.routing.validate().map_err(|e| anyhow::anyhow!(e))?;

        match self.spec.cache.backend.as_str() {
            "memory" => {}
            "redis" => {
                if self.spec.cache.url.is_none() {
                    anyhow::bail!("cache.url is required for the redis backend");
                }
            }
            other => anyhow::bail!("Unknown cache backend: '{}'", other),
        }

        Ok(())
    }

    /// Build the routing catalog from enabled providers.
    pub fn catalog(&self) -> ProviderCatalog {
        let mut catalog = ProviderCatalog::new();
        for provider in self.spec.providers.iter().filter(|p| p.enabled) {
            for entry in &provider.models {
                let descriptor = ProviderDescriptor {
                    name: provider.name.clone(),
                    model: entry.model.clone(),
                    cost_per_1k: entry.cost_per_1k,
                    pricing: entry.pricing,
                    avg_latency_ms: entry.avg_latency_ms,
                    reliability: entry.reliability,
                    max_tokens: entry.max_tokens,
                    capabilities: entry.capabilities.clone(),
                };
                for task in &entry.task_types {
                    catalog.register(*task, descriptor.clone());
                }
            }
        }
        catalog
    }
}
