//! Literature and ontology clients.

pub mod eutils;
pub mod ontology;

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::records::ArticleRecord;

/// The raw search-and-fetch contract of a literature database.
pub trait LiteratureSource {
    /// Ordered identifiers of the articles matching `query`, at most `max_results`.
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;

    /// `Ok(None)` when the database has no record for `id`.
    fn fetch_detail(&self, id: &str) -> Result<Option<ArticleRecord>>;
}

impl<S: LiteratureSource + ?Sized> LiteratureSource for &S {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        (**self).search(query, max_results)
    }

    fn fetch_detail(&self, id: &str) -> Result<Option<ArticleRecord>> {
        (**self).fetch_detail(id)
    }
}

impl<S: LiteratureSource + ?Sized> LiteratureSource for Box<S> {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        (**self).search(query, max_results)
    }

    fn fetch_detail(&self, id: &str) -> Result<Option<ArticleRecord>> {
        (**self).fetch_detail(id)
    }
}

/// Fixed sleep after every outbound request.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pause(&self) {
        if !self.delay.is_zero() {
            debug!(delay_ms = self.delay.as_millis() as u64, "pacing");
            thread::sleep(self.delay);
        }
    }
}

/// Wraps a [`LiteratureSource`] so that every call is paced, and batch
/// fetches survive individual failures.
pub struct RateLimitedFetcher<S> {
    source: S,
    pacer: Pacer,
}

impl<S: LiteratureSource> RateLimitedFetcher<S> {
    pub fn new(source: S, pacer: Pacer) -> Self {
        Self { source, pacer }
    }

    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let result = self.source.search(query, max_results);
        self.pacer.pause();
        result
    }

    pub fn fetch_detail(&self, id: &str) -> Result<Option<ArticleRecord>> {
        let result = self.source.fetch_detail(id);
        self.pacer.pause();
        result
    }

    /// Fetches every id in order. Ids with no record are dropped; ids whose
    /// fetch fails are logged and skipped.
    pub fn fetch_all(&self, ids: &[String]) -> Vec<ArticleRecord> {
        let mut articles = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            match self.fetch_detail(id) {
                Ok(Some(article)) => {
                    debug!(id = %id, n = i + 1, total = ids.len(), title = %article.title, "fetched article");
                    articles.push(article);
                }
                Ok(None) => debug!(id = %id, "no record for id"),
                Err(e) => warn!(id = %id, error = %e, "error fetching article, skipping"),
            }
        }
        articles
    }

    /// Search followed by a detail fetch for every hit.
    pub fn search_and_fetch(&self, query: &str, max_results: usize) -> Result<Vec<ArticleRecord>> {
        let ids = self.search(query, max_results)?;
        let articles = self.fetch_all(&ids);
        info!(query = %query, ids = ids.len(), fetched = articles.len(), "retrieved articles");
        Ok(articles)
    }
}
