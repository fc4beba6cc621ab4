use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_DOCUMENT_PATH: &str = "dataset/usa-2025-budget-brief-energy-dep-v2.pdf";
const DEFAULT_QDRANT_URL: &str = "http://127.0.0.1:6333";
const DEFAULT_COLLECTION: &str = "budget-rag";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;
const DEFAULT_LLM_MODEL: &str = "llama3.2:3b";
const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 500;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_BATCH_MAX_QUESTIONS: usize = 10;

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

/// Runtime configuration for the budget RAG service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path of the PDF corpus ingested by `build`.
    pub document_path: String,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection holding the document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of texts sent per embedding request during a build.
    pub embedding_batch_size: usize,
    /// Base URL of the Ollama runtime (embeddings and chat).
    pub ollama_url: String,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Chat model used for answer generation.
    pub llm_model: String,
    /// Sampling temperature used for answer generation.
    pub llm_temperature: f32,
    /// Maximum chunk length, measured in `text_splitter_length_unit`.
    pub text_splitter_chunk_size: usize,
    /// Overlap carried from the previous chunk, measured in the same unit.
    pub text_splitter_chunk_overlap: usize,
    /// Unit used to measure chunk length.
    pub text_splitter_length_unit: LengthUnit,
    /// Number of chunks retrieved for each question.
    pub retrieval_top_k: usize,
    /// Maximum number of questions accepted by a batch request.
    pub batch_max_questions: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic in-process hashing, for offline runs.
    Hash,
}

/// Length function used by the text splitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Unicode scalar values.
    Chars,
    /// Tokenizer tokens for the embedding model.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let embedding_provider = match get("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            None => EmbeddingProvider::Ollama,
        };
        let text_splitter_length_unit = match get("TEXT_SPLITTER_LENGTH_UNIT") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("TEXT_SPLITTER_LENGTH_UNIT".into()))?,
            None => LengthUnit::Chars,
        };

        let config = Self {
            document_path: get("DOCUMENT_PATH").unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.into()),
            qdrant_url: get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.into()),
            qdrant_collection_name: get("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.into()),
            qdrant_api_key: get("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", get("EMBEDDING_DIMENSION"), DEFAULT_EMBEDDING_DIMENSION)?,
            embedding_batch_size: parse_or(
                "EMBEDDING_BATCH_SIZE",
                get("EMBEDDING_BATCH_SIZE"),
                DEFAULT_EMBEDDING_BATCH_SIZE,
            )?,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            llm_temperature: parse_or("LLM_TEMPERATURE", get("LLM_TEMPERATURE"), DEFAULT_LLM_TEMPERATURE)?,
            text_splitter_chunk_size: parse_or(
                "TEXT_SPLITTER_CHUNK_SIZE",
                get("TEXT_SPLITTER_CHUNK_SIZE"),
                DEFAULT_CHUNK_SIZE,
            )?,
            text_splitter_chunk_overlap: parse_or(
                "TEXT_SPLITTER_CHUNK_OVERLAP",
                get("TEXT_SPLITTER_CHUNK_OVERLAP"),
                DEFAULT_CHUNK_OVERLAP,
            )?,
            text_splitter_length_unit,
            retrieval_top_k: parse_or("RETRIEVAL_TOP_K", get("RETRIEVAL_TOP_K"), DEFAULT_TOP_K)?,
            batch_max_questions: parse_or(
                "BATCH_MAX_QUESTIONS",
                get("BATCH_MAX_QUESTIONS"),
                DEFAULT_BATCH_MAX_QUESTIONS,
            )?,
            server_port: get("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if self.batch_max_questions == 0 {
            return Err(ConfigError::InvalidValue("BATCH_MAX_QUESTIONS".into()));
        }
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(ConfigError::InvalidValue("LLM_TEMPERATURE".into()));
        }
        if self.embedding_provider == EmbeddingProvider::OpenAI && self.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for LengthUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" => Ok(Self::Chars),
            "tokens" => Ok(Self::Tokens),
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

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        document = %config.document_path,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        llm_model = %config.llm_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
