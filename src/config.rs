use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::records::Source;

pub type Number = f32;

pub const ENV_PREFIX: &str = "GENEVIDENCE";

#[derive(Deserialize, Default)]
pub struct GenevidenceConfig {
    pub cache_dir: Option<String>,
    pub cache_backend: Option<String>,
    pub index_path: Option<String>,
    pub metadata_path: Option<String>,
    pub dimensions: Option<usize>,
    pub embedding_backend: Option<String>,
    pub embedding_url: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_key: Option<String>,
    pub max_chunk_length: Option<usize>,
    pub batch_size: Option<usize>,
    pub top_k: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub ncbi_api_key: Option<String>,
    pub literature_db: Option<String>,
    pub abstract_limit: Option<usize>,
    pub ontology_url: Option<String>,
    pub ontology: Option<String>,
    pub interpreter_url: Option<String>,
    pub interpreter_model: Option<String>,
    pub interpreter_api_key: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Json,
    Lmdb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackendKind {
    Hash,
    Api,
}

pub struct Settings {
    pub cache_dir: PathBuf,
    pub cache_backend: CacheBackendKind,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
    pub dimensions: usize,
    pub embedding_backend: EmbeddingBackendKind,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub max_chunk_length: usize,
    pub batch_size: usize,
    pub top_k: usize,
    pub request_delay_ms: u64,
    pub ncbi_api_key: Option<String>,
    pub literature_db: Source,
    pub abstract_limit: Option<usize>,
    pub ontology_url: String,
    pub ontology: String,
    pub interpreter_url: String,
    pub interpreter_model: String,
    pub interpreter_api_key: Option<String>,
    pub temperature: f32,
}

impl Settings {
    /// Reads `genevidence.{toml,json,yaml}` from the working directory when
    /// present, then `GENEVIDENCE_*` environment variables.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("genevidence").required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let raw: GenevidenceConfig = config
            .try_deserialize()
            .context("Invalid configuration values")?;
        Self::resolve(raw)
    }

    pub fn resolve(raw: GenevidenceConfig) -> Result<Self> {
        let cache_backend = match raw.cache_backend.as_deref().unwrap_or("json") {
            "json" => CacheBackendKind::Json,
            "lmdb" => CacheBackendKind::Lmdb,
            other => bail!("Unknown cache backend: {}", other),
        };

        let embedding_backend = match raw.embedding_backend.as_deref().unwrap_or("hash") {
            "hash" => EmbeddingBackendKind::Hash,
            "api" => EmbeddingBackendKind::Api,
            other => bail!("Unknown embedding backend: {}", other),
        };

        let literature_db = raw
            .literature_db
            .as_deref()
            .unwrap_or("pubmed")
            .parse::<Source>()
            .map_err(anyhow::Error::msg)?;

        let dimensions = raw.dimensions.unwrap_or(768);
        let max_chunk_length = raw.max_chunk_length.unwrap_or(crate::chunk::DEFAULT_MAX_LENGTH);
        let batch_size = raw.batch_size.unwrap_or(crate::store::DEFAULT_BATCH_SIZE);

        if dimensions == 0 {
            bail!("{}_DIMENSIONS must be positive.", ENV_PREFIX);
        }
        if max_chunk_length == 0 {
            bail!("{}_MAX_CHUNK_LENGTH must be positive.", ENV_PREFIX);
        }
        if batch_size == 0 {
            bail!("{}_BATCH_SIZE must be positive.", ENV_PREFIX);
        }
        if embedding_backend == EmbeddingBackendKind::Api && raw.embedding_url.is_none() {
            bail!("{}_EMBEDDING_URL is required for the api embedding backend.", ENV_PREFIX);
        }

        Ok(Self {
            cache_dir: raw.cache_dir.unwrap_or_else(|| "data/genes".to_string()).into(),
            cache_backend,
            index_path: raw
                .index_path
                .unwrap_or_else(|| "data/processed/vector_store.index".to_string())
                .into(),
            metadata_path: raw
                .metadata_path
                .unwrap_or_else(|| "data/processed/vector_metadata.json".to_string())
                .into(),
            dimensions,
            embedding_backend,
            embedding_url: raw.embedding_url.unwrap_or_default(),
            embedding_model: raw
                .embedding_model
                .unwrap_or_else(|| "all-mpnet-base-v2".to_string()),
            embedding_api_key: raw.embedding_api_key,
            max_chunk_length,
            batch_size,
            top_k: raw.top_k.unwrap_or(5),
            request_delay_ms: raw.request_delay_ms.unwrap_or(500),
            ncbi_api_key: raw.ncbi_api_key,
            literature_db,
            abstract_limit: raw.abstract_limit,
            ontology_url: raw
                .ontology_url
                .unwrap_or_else(|| crate::sources::ontology::DEFAULT_OLS_URL.to_string()),
            ontology: raw.ontology.unwrap_or_else(|| "hp".to_string()),
            interpreter_url: raw
                .interpreter_url
                .unwrap_or_else(|| crate::interpret::DEFAULT_CHAT_URL.to_string()),
            interpreter_model: raw
                .interpreter_model
                .unwrap_or_else(|| "deepseek/deepseek-chat-v3-0324:free".to_string()),
            interpreter_api_key: raw
                .interpreter_api_key
                .or_else(|| env::var("OPENROUTER_API_KEY").ok()),
            temperature: raw.temperature.unwrap_or(0.3),
        })
    }

    pub fn print_config(&self) {
        println!("cache_dir={}", self.cache_dir.display());
        println!("cache_backend={:?}", self.cache_backend);
        println!("index_path={}", self.index_path.display());
        println!("metadata_path={}", self.metadata_path.display());
        println!("dimensions={}", self.dimensions);
        println!("embedding_backend={:?}", self.embedding_backend);
        println!("embedding_url={}", self.embedding_url);
        println!("embedding_model={}", self.embedding_model);
        println!("max_chunk_length={}", self.max_chunk_length);
        println!("batch_size={}", self.batch_size);
        println!("top_k={}", self.top_k);
        println!("request_delay_ms={}", self.request_delay_ms);
        println!("literature_db={}", self.literature_db.db());
        println!("abstract_limit={:?}", self.abstract_limit);
        println!("ontology_url={}", self.ontology_url);
        println!("ontology={}", self.ontology);
        println!("interpreter_url={}", self.interpreter_url);
        println!("interpreter_model={}", self.interpreter_model);
        println!("temperature={}", self.temperature);
    }
}

/// `--verbose` or `GENEVIDENCE_VERBOSE=true` lowers the default log level to
/// debug; `RUST_LOG` always wins.
pub fn init_tracing(verbose: bool) {
    let verbose = verbose
        || env::var(format!("{}_VERBOSE", ENV_PREFIX)).is_ok_and(|v| v == "true");
    let default = if verbose { "genevidence=debug" } else { "genevidence=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(GenevidenceConfig::default()).unwrap();
        assert_eq!(settings.cache_backend, CacheBackendKind::Json);
        assert_eq!(settings.embedding_backend, EmbeddingBackendKind::Hash);
        assert_eq!(settings.dimensions, 768);
        assert_eq!(settings.max_chunk_length, 512);
        assert_eq!(settings.batch_size, 32);
        assert_eq!(settings.request_delay_ms, 500);
        assert_eq!(settings.literature_db, Source::Pubmed);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let raw = GenevidenceConfig {
            cache_backend: Some("redis".into()),
            ..Default::default()
        };
        assert!(Settings::resolve(raw).is_err());
    }

    #[test]
    fn test_api_embedder_needs_url() {
        let raw = GenevidenceConfig {
            embedding_backend: Some("api".into()),
            ..Default::default()
        };
        assert!(Settings::resolve(raw).is_err());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let raw = GenevidenceConfig {
            dimensions: Some(0),
            ..Default::default()
        };
        assert!(Settings::resolve(raw).is_err());
    }
}
