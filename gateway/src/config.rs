//! Ingest Gateway configuration. Spec §6 "Configuration" plus the CORS
//! allowlist supplemented from `examples/original_source/apps/api/main.py`
//! (see SPEC_FULL.md §2). Loaded the same "env var, else hard default" way
//! as the teacher's `AppConfig::from_env`.

use lore_anchor_shared::config::{env_list, env_or, env_parse_or};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    pub jwt_secret: String,

    /// `"memory"` selects the in-process `InMemoryCatalog`; anything else is
    /// treated as an ArangoDB connection URL.
    pub database_connection_string: String,
    pub database_name: String,
    pub database_user: String,
    pub database_password: String,

    pub object_store_backend: String,
    pub object_store_path: String,
    pub object_store_bucket: String,
    pub object_store_region: String,
    pub object_store_key: String,
    pub object_store_secret: String,
    pub object_store_endpoint: String,
    /// Public base used to mint pre-signed download URLs (spec §4.1 `get`).
    pub object_store_public_base: String,

    pub queue_name: String,
    pub dead_letter_queue_name: String,

    /// Free-tier monthly upload cap (spec §4.1 "Quota enforcement").
    pub free_tier_monthly_cap: u32,
    pub rate_limit_uploads_per_minute: u32,
    pub rate_limit_reads_per_minute: u32,

    /// Comma-separated allowlist; empty means "allow any origin" (the
    /// teacher's permissive dev default), logged as a warning.
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid numeric config value: {0}")]
    Parse(String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8080u16).map_err(ConfigError::Parse)?,

            jwt_secret: env_or("JWT_SECRET", "dev_jwt_secret_change_in_production"),

            database_connection_string: env_or("DB_CONNECTION_STRING", "memory"),
            database_name: env_or("DB_NAME", "lore_anchor"),
            database_user: env_or("DB_USER", "root"),
            database_password: env_or("DB_PASSWORD", ""),

            object_store_backend: env_or("OBJECT_STORE_BACKEND", "memory"),
            object_store_path: env_or("OBJECT_STORE_PATH", "./data"),
            object_store_bucket: env_or("OBJECT_STORE_BUCKET", ""),
            object_store_region: env_or("OBJECT_STORE_REGION", "us-east-1"),
            object_store_key: env_or("OBJECT_STORE_KEY", ""),
            object_store_secret: env_or("OBJECT_STORE_SECRET", ""),
            object_store_endpoint: env_or("OBJECT_STORE_ENDPOINT", ""),
            object_store_public_base: env_or("OBJECT_STORE_PUBLIC_BASE", "https://cdn.example.invalid"),

            queue_name: env_or("QUEUE_NAME", lore_anchor_shared::queue::QUEUE_NAME),
            dead_letter_queue_name: env_or(
                "DEAD_LETTER_QUEUE_NAME",
                lore_anchor_shared::queue::DEAD_LETTER_QUEUE_NAME,
            ),

            free_tier_monthly_cap: env_parse_or("FREE_TIER_MONTHLY_CAP", 5u32)
                .map_err(ConfigError::Parse)?,
            rate_limit_uploads_per_minute: env_parse_or("RATE_LIMIT_UPLOADS_PER_MINUTE", 10u32)
                .map_err(ConfigError::Parse)?,
            rate_limit_reads_per_minute: env_parse_or("RATE_LIMIT_READS_PER_MINUTE", 60u32)
                .map_err(ConfigError::Parse)?,

            cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS"),
        })
    }

    /// A config with in-memory Catalog/Queue/ObjectStore backends and a
    /// fixed test secret, for integration tests that don't want `.env`
    /// or real credentials. Mirrors the teacher's `create_mock_shared_state`.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            database_connection_string: "memory".to_string(),
            database_name: "lore_anchor_test".to_string(),
            database_user: "root".to_string(),
            database_password: String::new(),
            object_store_backend: "memory".to_string(),
            object_store_path: "./data".to_string(),
            object_store_bucket: String::new(),
            object_store_region: "us-east-1".to_string(),
            object_store_key: String::new(),
            object_store_secret: String::new(),
            object_store_endpoint: String::new(),
            object_store_public_base: "https://cdn.example.invalid".to_string(),
            queue_name: lore_anchor_shared::queue::QUEUE_NAME.to_string(),
            dead_letter_queue_name: lore_anchor_shared::queue::DEAD_LETTER_QUEUE_NAME.to_string(),
            free_tier_monthly_cap: 5,
            rate_limit_uploads_per_minute: 1000,
            rate_limit_reads_per_minute: 1000,
            cors_allowed_origins: Vec::new(),
        }
    }
}
