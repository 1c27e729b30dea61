// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # PostgreSQL Provider Configuration Store
//!
//! Backs admin-managed provider configuration: base URLs, per-token
//! pricing and encrypted API keys. `api_key_encrypted` is
//! hex(nonce || AES-256-GCM ciphertext), sealed with the process-wide
//! secret (see `infrastructure::crypto`).
//!
//! The store is optional. Without a configured database URL the
//! credential resolver falls back to environment variables only.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::infrastructure::crypto;

/// One row of the `ai_providers` table.
#[derive(Debug, Clone)]
pub struct ProviderRow {
    pub name: String,
    pub base_url: String,
    pub cost_per_1k_input: f64,
    pub cost_per_1k_output: f64,
    pub max_tokens: i32,
    pub is_active: bool,
    pub priority: i32,
}

pub struct ProviderStore {
    pool: PgPool,
}

impl ProviderStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Encrypted API key for an active provider, if one is stored.
    pub async fn encrypted_api_key(&self, name: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT api_key_encrypted FROM ai_providers WHERE name = $1 AND is_active",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("api_key_encrypted")))
    }

    /// All active providers ordered by priority.
    pub async fn active_providers(&self) -> Result<Vec<ProviderRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT name, base_url, cost_per_1k_input, cost_per_1k_output,
                   max_tokens, is_active, priority
            FROM ai_providers
            WHERE is_active
            ORDER BY priority DESC, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProviderRow {
                name: r.get("name"),
                base_url: r.get("base_url"),
                cost_per_1k_input: r.get("cost_per_1k_input"),
                cost_per_1k_output: r.get("cost_per_1k_output"),
                max_tokens: r.get("max_tokens"),
                is_active: r.get("is_active"),
                priority: r.get("priority"),
            })
            .collect())
    }

    /// Admin reconfiguration: upsert a provider row, sealing the API key
    /// with the process-wide secret.
    pub async fn upsert(
        &self,
        row: &ProviderRow,
        api_key_plaintext: Option<&str>,
        secret_hex: &str,
    ) -> Result<()> {
        let encrypted = match api_key_plaintext {
            Some(key) => Some(crypto::encrypt(key.as_bytes(), secret_hex)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO ai_providers (
                name, base_url, api_key_encrypted,
                cost_per_1k_input, cost_per_1k_output,
                max_tokens, is_active, priority
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (name) DO UPDATE SET
                base_url = EXCLUDED.base_url,
                api_key_encrypted = COALESCE(EXCLUDED.api_key_encrypted, ai_providers.api_key_encrypted),
                cost_per_1k_input = EXCLUDED.cost_per_1k_input,
                cost_per_1k_output = EXCLUDED.cost_per_1k_output,
                max_tokens = EXCLUDED.max_tokens,
                is_active = EXCLUDED.is_active,
                priority = EXCLUDED.priority
            "#,
        )
        .bind(&row.name)
        .bind(&row.base_url)
        .bind(encrypted)
        .bind(row.cost_per_1k_input)
        .bind(row.cost_per_1k_output)
        .bind(row.max_tokens)
        .bind(row.is_active)
        .bind(row.priority)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
