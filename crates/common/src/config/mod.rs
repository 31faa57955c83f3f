//! Configuration management for Clarus services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Legacy deployment variables (OPENAI_API_KEY, PINECONE_*)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Chat model configuration
    pub llm: LlmConfig,

    /// Embedding service configuration
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    pub vector_store: VectorStoreConfig,

    /// Retrieval defaults for the scripture tool
    pub retrieval: RetrievalConfig,

    /// Tool-call loop configuration
    pub orchestrator: OrchestratorConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum request body in bytes (essays can be long)
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat model provider: openai, mock
    pub provider: String,

    /// API key for the chat completion endpoint
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: String,

    /// Model to use
    pub model: String,

    /// Maximum output tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Vector store provider: pinecone, mock
    pub provider: String,

    /// Index host, e.g. https://bijbel-abc123.svc.us-east-1.pinecone.io
    pub host: Option<String>,

    /// Index name (informational, used in logs)
    pub index: Option<String>,

    /// API key for the vector store
    pub api_key: Option<String>,

    /// Namespace inside the index
    pub namespace: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Payload field names
    pub fields: PayloadFields,
}

/// Payload keys under which verse records are stored
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PayloadFields {
    pub text: String,
    pub book: String,
    pub chapter: String,
    pub verse: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Hits returned when the model gives no top_k
    pub default_top_k: usize,

    /// Upper clamp for top_k
    pub max_top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum model calls per request
    pub max_rounds: u32,

    /// System prompt override
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, clarus_context=debug)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    pub metrics_port: u16,

    /// Service name for tracing
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_max_body_bytes() -> usize { 2 * 1024 * 1024 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4.1-mini".to_string() }
fn default_llm_max_tokens() -> u32 { 800 }
fn default_llm_temperature() -> f32 { 0.5 }
fn default_llm_timeout() -> u64 { 45 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_timeout() -> u64 { 30 }
fn default_vector_provider() -> String { "pinecone".to_string() }
fn default_vector_timeout() -> u64 { 15 }
fn default_top_k() -> usize { 5 }
fn default_max_top_k() -> usize { 20 }
fn default_max_rounds() -> u32 { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "clarus".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: default_llm_base(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_vector_provider(),
            host: None,
            index: None,
            api_key: None,
            namespace: None,
            timeout_secs: default_vector_timeout(),
            fields: PayloadFields::default(),
        }
    }
}

impl Default for PayloadFields {
    fn default() -> Self {
        Self {
            text: "tekst".to_string(),
            book: "boek".to_string(),
            chapter: "hoofdstuk".to_string(),
            verse: "vers".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

impl RetrievalConfig {
    /// Clamp a requested hit count into `1..=max_top_k`
    pub fn clamp_top_k(&self, requested: Option<i64>) -> usize {
        let max = self.max_top_k.max(1) as i64;
        match requested {
            Some(k) => k.clamp(1, max) as usize,
            None => self.default_top_k.clamp(1, max as usize),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fill unset keys from the variables the first deployment used.
    ///
    /// Explicit `APP__` settings always win.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_key = lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty());

        if self.llm.api_key.is_none() {
            self.llm.api_key = openai_key.clone();
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = openai_key;
        }
        if self.vector_store.api_key.is_none() {
            self.vector_store.api_key = lookup("PINECONE_API_KEY");
        }
        if self.vector_store.host.is_none() {
            self.vector_store.host = lookup("PINECONE_HOST");
        }
        if self.vector_store.index.is_none() {
            self.vector_store.index = lookup("PINECONE_INDEX");
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

}
