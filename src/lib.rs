//! Literature evidence retrieval for gene and phenotype triage.
//!
//! Genes and phenotypes are turned into cached sets of article records
//! ([`cache`], [`sources`], [`retriever`]), or searched semantically over a
//! flat L2 index of embedded article chunks ([`chunk`], [`embed`],
//! [`store`]). [`context`] renders the evidence for the interpreter.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod context;
pub mod embed;
pub mod error;
pub mod index;
pub mod interpret;
pub mod ranks;
pub mod records;
pub mod retriever;
pub mod sources;
pub mod store;
pub mod vector_ops;

pub use cache::{CacheBackend, EvidenceCache, JsonDirBackend, LmdbBackend};
pub use context::ContextFormatter;
pub use embed::{ApiEmbedder, Embedder, HashEmbedder};
pub use error::{Error, Result};
pub use records::{ArticleRecord, ChunkRecord, EntityKey, EntityKind, Evidence, Source};
pub use retriever::{expand_query, LiveRetriever, Retriever, SemanticRetriever};
pub use sources::{LiteratureSource, Pacer, RateLimitedFetcher};
pub use store::VectorStore;
