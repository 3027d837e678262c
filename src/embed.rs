//! Text embedding backends.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Number;
use crate::error::{Error, Result};

/// Maps text to fixed-dimension dense vectors.
pub trait Embedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>>;

    fn embed(&self, text: &str) -> Result<Vec<Number>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| Error::Embedding("embedder returned no vector".to_string()))
    }

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Feature-hashing embedder. Deterministic and model-free: each lower-cased
/// token adds a signed count to a few hashed buckets, scaled by token count.
/// Vectors are not unit-normalized.
pub struct HashEmbedder {
    dimension: usize,
    num_hashes: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            num_hashes: 4,
        }
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn bucket(&self, token: &str, seed: u64) -> (usize, Number) {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        ((h % self.dimension as u64) as usize, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<Number> {
        let mut vector = vec![0.0; self.dimension];
        let mut tokens = 0usize;
        for token in Self::tokenize(text) {
            tokens += 1;
            for seed in 0..self.num_hashes as u64 {
                let (idx, sign) = self.bucket(&token, seed);
                vector[idx] += sign;
            }
        }
        if tokens > 0 {
            let scale = 1.0 / (tokens as Number).sqrt();
            vector.iter_mut().for_each(|v| *v *= scale);
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>> {
        if self.dimension == 0 {
            return Err(Error::Config("embedding dimension must be positive".into()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<Number>,
    #[serde(default)]
    index: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint, for example a
/// local server hosting `all-mpnet-base-v2`.
pub struct ApiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl ApiEmbedder {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, dimension: usize) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
            dimension,
        })
    }
}

impl Embedder for ApiEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let mut resp: EmbeddingResponse = request.send()?.error_for_status()?.json()?;
        debug!(count = resp.data.len(), model = %self.model, "embedding response");

        if resp.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "requested {} embeddings, received {}",
                texts.len(),
                resp.data.len()
            )));
        }
        resp.data.sort_by_key(|d| d.index);

        resp.data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimension {
                    return Err(Error::DimensionMismatch {
                        expected: self.dimension,
                        got: d.embedding.len(),
                    });
                }
                Ok(d.embedding)
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
