//! TOML configuration parsing and validation.
//!
//! Snippy reads a single TOML file (default `./config/snippy.toml`).
//! Secrets are never read from the file: API keys come from the
//! environment variables named by `api_key_env`.
//!
//! ```toml
//! [db]
//! path = "./data/snippy.sqlite"
//!
//! [embedding]
//! provider = "azure-openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//! endpoint = "https://my-resource.openai.azure.com"
//!
//! [retrieval]
//! top_k = 5
//!
//! [agent]
//! endpoint = "https://my-project.services.ai.azure.com/api/projects/snippy"
//! model = "gpt-4o"
//!
//! [server]
//! bind = "127.0.0.1:7071"
//! ```
//!
//! `SNIPPY_DB_PATH` and `SNIPPY_BIND` override `db.path` and
//! `server.bind` respectively.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Absent means authoring operations are disabled.
    #[serde(default)]
    pub agent: Option<AgentConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `disabled`, `openai`, or `azure-openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL. Required for `azure-openai`; defaults to the public
    /// OpenAI API for `openai`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Azure deployment name. Defaults to `model`.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default = "default_embedding_api_version")]
    pub api_version: String,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            endpoint: None,
            deployment: None,
            api_version: default_embedding_api_version(),
            api_key_env: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embedding_api_version() -> String {
    "2024-10-21".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Name of the environment variable holding the API key.
    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "azure-openai") => "AZURE_OPENAI_API_KEY",
            (None, _) => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results returned by a similarity search when `k` is omitted.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound on a caller-supplied `k`.
    #[serde(default = "default_max_k")]
    pub max_k: usize,
    /// Snippets pre-fetched into an authoring prompt.
    #[serde(default = "default_context_k")]
    pub context_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_k: default_max_k(),
            context_k: default_context_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_k() -> usize {
    50
}
fn default_context_k() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Agent service project endpoint.
    pub endpoint: String,
    /// Model deployment the agent runs on.
    pub model: String,
    #[serde(default = "default_agent_api_version")]
    pub api_version: String,
    #[serde(default = "default_agent_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Budget for a whole run, including tool round-trips.
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for each individual HTTP request to the service.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_agent_api_version() -> String {
    "v1".to_string()
}
fn default_agent_key_env() -> String {
    "AZURE_AI_AGENTS_API_KEY".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_agent_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7071".to_string()
}

impl Config {
    /// A config with every optional section at its default and the
    /// database at `db_path`. Used by tests and embedding binaries.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            agent: None,
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if let Ok(db_path) = std::env::var("SNIPPY_DB_PATH") {
        config.db.path = PathBuf::from(db_path);
    }
    if let Ok(bind) = std::env::var("SNIPPY_BIND") {
        config.server.bind = bind;
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.top_k > config.retrieval.max_k {
        anyhow::bail!("retrieval.top_k must be <= retrieval.max_k");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "azure-openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or azure-openai.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!("embedding.dims must be > 0");
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.provider == "azure-openai" && config.embedding.endpoint.is_none() {
            anyhow::bail!("embedding.endpoint is required for azure-openai");
        }
    }

    // Agent
    if let Some(agent) = &config.agent {
        if agent.endpoint.trim().is_empty() {
            anyhow::bail!("agent.endpoint must not be empty");
        }
        if agent.poll_interval_ms == 0 {
            anyhow::bail!("agent.poll_interval_ms must be > 0");
        }
        if agent.timeout_secs == 0 {
            anyhow::bail!("agent.timeout_secs must be > 0");
        }
    }

    Ok(())
}
