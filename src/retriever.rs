//! Evidence retrieval for genes and phenotypes.

use tracing::{debug, info};

use crate::cache::EvidenceCache;
use crate::embed::Embedder;
use crate::error::Result;
use crate::records::{EntityKey, EntityKind, Evidence};
use crate::sources::{LiteratureSource, RateLimitedFetcher};
use crate::store::VectorStore;

/// PubMed boolean query covering the usual spellings of a gene symbol,
/// restricted to variant and disease literature.
pub fn expand_query(gene: &str) -> String {
    format!(
        "(\"{g} protein, human\"[Supplementary Concept] OR \"{g} protein, human\"[All Fields] \
         OR \"{g}\"[All Fields] OR \"genes, {g}\"[MeSH Terms] \
         OR (\"genes\"[All Fields] AND \"{g}\"[All Fields]) OR \"{g} genes\"[All Fields]) \
         AND variants[All Fields] \
         AND (\"disease\"[MeSH Terms] OR \"disease\"[All Fields] OR \"diseases\"[All Fields])",
        g = gene
    )
}

/// Cache-backed retrieval from a live literature API.
pub struct LiveRetriever<S> {
    cache: EvidenceCache,
    fetcher: RateLimitedFetcher<S>,
    kind: EntityKind,
    expand: bool,
}

impl<S: LiteratureSource> LiveRetriever<S> {
    pub fn new(cache: EvidenceCache, fetcher: RateLimitedFetcher<S>) -> Self {
        Self {
            cache,
            fetcher,
            kind: EntityKind::Gene,
            expand: false,
        }
    }

    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    /// Search with [`expand_query`] instead of the bare entity. The cache
    /// key stays the bare entity.
    pub fn with_expansion(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    /// `k == 0` asks for nothing and neither reads nor writes the cache.
    pub fn retrieve(&self, entity: &str, k: usize) -> Result<Vec<Evidence>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let key = EntityKey::new(self.kind, entity);
        let records = self.cache.get_or_fetch(&key, || {
            let query = if self.expand {
                expand_query(key.as_str())
            } else {
                key.as_str().to_string()
            };
            self.fetcher.search_and_fetch(&query, k)
        })?;
        Ok(records.into_iter().map(Evidence::from).collect())
    }
}

/// Nearest-neighbour retrieval over a prebuilt vector store.
pub struct SemanticRetriever<E> {
    store: VectorStore<E>,
}

impl<E: Embedder> SemanticRetriever<E> {
    pub fn new(store: VectorStore<E>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VectorStore<E> {
        &self.store
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Evidence>> {
        let results = self.store.search(query, k)?;
        debug!(query, k, found = results.len(), "semantic search");
        Ok(results)
    }
}

/// The two retrieval modes; which one is used is fixed at construction.
pub enum Retriever<S, E> {
    Live(LiveRetriever<S>),
    Semantic(SemanticRetriever<E>),
}

impl<S: LiteratureSource, E: Embedder> Retriever<S, E> {
    /// Live mode: source order. Semantic mode: ascending distance.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Evidence>> {
        match self {
            Retriever::Live(live) => live.retrieve(query, k),
            Retriever::Semantic(semantic) => semantic.retrieve(query, k),
        }
    }

    /// Evidence for several entities, concatenated in input order.
    pub fn retrieve_many<T: AsRef<str>>(&self, queries: &[T], k: usize) -> Result<Vec<Evidence>> {
        let mut all = Vec::new();
        for query in queries {
            let found = self.retrieve(query.as_ref(), k)?;
            info!(query = query.as_ref(), count = found.len(), "retrieved evidence");
            all.extend(found);
        }
        Ok(all)
    }
}
