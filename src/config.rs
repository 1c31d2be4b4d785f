use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_QDRANT_URL: &str = "http://127.0.0.1:6333";
const DEFAULT_INDEX_NAME: &str = "documents";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Rusty Docs pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend that stores chunk documents.
    pub vector_store_backend: VectorStoreBackend,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Name of the index (Qdrant collection) holding chunk documents.
    pub index_name: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible embeddings endpoint.
    pub openai_base_url: String,
    /// Number of embedding retries after the first failed attempt.
    pub embedding_max_retries: u32,
    /// Fixed delay between embedding attempts, in milliseconds.
    pub embedding_retry_delay_ms: u64,
    /// Number of retries for a failing vector store call.
    pub store_max_retries: u32,
    /// Fixed delay between vector store retries, in milliseconds.
    pub store_retry_delay_ms: u64,
    /// Number of documents sent per bulk vector store request.
    pub store_batch_size: usize,
    /// Upper bound on chunk length, in characters.
    pub chunk_max_size: usize,
    /// Upper bound on the overlap carried between chunks, in characters.
    pub chunk_overlap_size: usize,
    /// Remove already-written chunks when processing a document fails.
    pub cleanup_on_failure: bool,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic offline hashing embeddings.
    Hashing,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    /// Qdrant over its HTTP API.
    Qdrant,
    /// Process-local index, useful for dry runs.
    Memory,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        Ok(Self {
            vector_store_backend: vars
                .optional("VECTOR_STORE_BACKEND")
                .map(|value| {
                    value.parse().map_err(|()| {
                        ConfigError::InvalidValue("VECTOR_STORE_BACKEND".to_string())
                    })
                })
                .transpose()?
                .unwrap_or(VectorStoreBackend::Qdrant),
            qdrant_url: vars.or("QDRANT_URL", DEFAULT_QDRANT_URL),
            qdrant_api_key: vars.optional("QDRANT_API_KEY"),
            index_name: vars.or("INDEX_NAME", DEFAULT_INDEX_NAME),
            embedding_provider: vars.required("EMBEDDING_PROVIDER")?.parse().map_err(|()| {
                ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string())
            })?,
            embedding_model: vars.required("EMBEDDING_MODEL")?,
            embedding_dimension: vars.required("EMBEDDING_DIMENSION")?.parse().map_err(|_| {
                ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string())
            })?,
            ollama_url: vars.or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            openai_api_key: vars.optional("OPENAI_API_KEY"),
            openai_base_url: vars.or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            embedding_max_retries: vars.parse_or("EMBEDDING_MAX_RETRIES", 3)?,
            embedding_retry_delay_ms: vars.parse_or("EMBEDDING_RETRY_DELAY_MS", 1000)?,
            store_max_retries: vars.parse_or("STORE_MAX_RETRIES", 3)?,
            store_retry_delay_ms: vars.parse_or("STORE_RETRY_DELAY_MS", 1000)?,
            store_batch_size: vars.parse_or("STORE_BATCH_SIZE", 100)?,
            chunk_max_size: vars.parse_or("CHUNK_MAX_SIZE", 1000)?,
            chunk_overlap_size: vars.parse_or("CHUNK_OVERLAP_SIZE", 200)?,
            cleanup_on_failure: vars
                .optional("CLEANUP_ON_FAILURE")
                .map(|value| {
                    parse_flag(&value)
                        .ok_or_else(|| ConfigError::InvalidValue("CLEANUP_ON_FAILURE".into()))
                })
                .transpose()?
                .unwrap_or(true),
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string())),
            None => Ok(default),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

impl FromStr for VectorStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
///
/// An already installed configuration is kept and returned.
pub fn try_init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        backend = ?config.vector_store_backend,
        qdrant_url = %config.qdrant_url,
        index = %config.index_name,
        embedding_provider = ?config.embedding_provider,
        chunk_max_size = config.chunk_max_size,
        chunk_overlap_size = config.chunk_overlap_size,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

/// Like [`try_init_config`], panicking when the environment is incomplete.
pub fn init_config() {
    try_init_config().expect("Failed to load config from environment");
}
