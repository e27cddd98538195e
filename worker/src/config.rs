//! Worker configuration. Spec §4.4 "Configuration at the worker" plus the
//! signing-credential and dev-mode knobs from §9's Open Question.

use lore_anchor_shared::config::{env_flag, env_or, env_parse_or};

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub worker_id: String,

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

    pub queue_name: String,
    pub dead_letter_queue_name: String,
    pub poll_timeout_secs: u64,

    pub perturbation_epsilon: u8,
    pub perturbation_steps: u32,
    /// Optional path to gradient-variant model weights, checked once at
    /// startup warm-up (spec §4.4). Unset in a pure-Rust deployment with no
    /// pretrained weights to load.
    pub perturbation_model_path: Option<String>,

    pub signing_cert: String,
    pub signing_key: String,
    /// When true, a missing production signing key falls back to a
    /// hard-coded developer key instead of refusing to start. Resolved
    /// strictly per spec §9's Open Question — see DESIGN.md.
    pub dev_mode: bool,

    pub health_port: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid numeric config value: {0}")]
    Parse(String),
    #[error(
        "no production signing key configured (SIGNING_KEY_PEM) and WORKER_DEV_MODE is not set; refusing to start"
    )]
    MissingSigningKey,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let dev_mode = env_flag("WORKER_DEV_MODE", false);
        let signing_key = env_or("SIGNING_KEY_PEM", "");
        let signing_cert = env_or("SIGNING_CERT_PEM", "");

        if signing_key.is_empty() && !dev_mode {
            return Err(ConfigError::MissingSigningKey);
        }

        Ok(Self {
            worker_id: env_or("WORKER_ID", &format!("worker-{}", uuid::Uuid::now_v7())),

            database_connection_string: env_or("DB_CONNECTION_STRING", "http://localhost:8529"),
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

            queue_name: env_or("QUEUE_NAME", lore_anchor_shared::queue::QUEUE_NAME),
            dead_letter_queue_name: env_or(
                "DEAD_LETTER_QUEUE_NAME",
                lore_anchor_shared::queue::DEAD_LETTER_QUEUE_NAME,
            ),
            poll_timeout_secs: env_parse_or("QUEUE_POLL_TIMEOUT_SECS", 5u64)
                .map_err(ConfigError::Parse)?,

            perturbation_epsilon: env_parse_or("PERTURBATION_EPSILON", 8u8)
                .map_err(ConfigError::Parse)?,
            perturbation_steps: env_parse_or("PERTURBATION_STEPS", 3u32)
                .map_err(ConfigError::Parse)?,
            perturbation_model_path: {
                let raw = env_or("PERTURBATION_MODEL_PATH", "");
                if raw.is_empty() { None } else { Some(raw) }
            },

            signing_cert,
            signing_key,
            dev_mode,

            health_port: env_parse_or("WORKER_HEALTH_PORT", 9090u16).map_err(ConfigError::Parse)?,
        })
    }
}
