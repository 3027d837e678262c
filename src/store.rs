//! Embedded chunk store: a flat L2 index plus a parallel metadata array.
//!
//! `metadata[i]` always describes the vector at index position `i`. The index
//! and metadata files are written and read as a pair; they are not committed
//! atomically, so a failed save leaves the pair unusable.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::index::FlatL2Index;
use crate::records::{ChunkRecord, Evidence};

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct VectorStore<E> {
    embedder: E,
    index: FlatL2Index,
    metadata: Vec<ChunkRecord>,
}

impl<E: Embedder> VectorStore<E> {
    pub fn new(embedder: E, dimension: usize) -> Result<Self> {
        if embedder.dimension() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                got: embedder.dimension(),
            });
        }
        Ok(Self {
            embedder,
            index: FlatL2Index::new(dimension),
            metadata: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn metadata(&self) -> &[ChunkRecord] {
        &self.metadata
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    /// Embeds one batch and appends vectors and metadata in the same order.
    pub fn add_documents(&mut self, batch: &[ChunkRecord]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        if embeddings.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "{} returned {} vectors for {} texts",
                self.embedder.model_name(),
                embeddings.len(),
                batch.len()
            )));
        }

        self.index.add(&embeddings)?;
        self.metadata.extend_from_slice(batch);
        debug_assert_eq!(self.metadata.len(), self.index.len());
        Ok(())
    }

    pub fn add_in_batches(&mut self, chunks: &[ChunkRecord], batch_size: usize) -> Result<()> {
        let batch_size = batch_size.max(1);
        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            self.add_documents(batch)?;
            info!(
                processed = (i * batch_size + batch.len()),
                total = chunks.len(),
                "embedded chunks"
            );
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>, Q: AsRef<Path>>(&self, index_path: P, metadata_path: Q) -> Result<()> {
        let metadata_path = metadata_path.as_ref();
        self.index.save(index_path.as_ref())?;

        if let Some(parent) = metadata_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(metadata_path).map_err(|e| Error::io(metadata_path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.metadata)?;
        writer.flush().map_err(|e| Error::io(metadata_path, e))?;

        info!(
            vectors = self.len(),
            index = %index_path.as_ref().display(),
            metadata = %metadata_path.display(),
            "saved vector store"
        );
        Ok(())
    }

    /// Loads a saved pair. The embedder must produce vectors of the index's
    /// dimension and the metadata must have one record per vector.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(embedder: E, index_path: P, metadata_path: Q) -> Result<Self> {
        let index = FlatL2Index::load(index_path)?;
        if embedder.dimension() != index.dimension() {
            return Err(Error::DimensionMismatch {
                expected: index.dimension(),
                got: embedder.dimension(),
            });
        }

        let metadata_path = metadata_path.as_ref();
        let file = File::open(metadata_path).map_err(|e| Error::io(metadata_path, e))?;
        let metadata: Vec<ChunkRecord> = serde_json::from_reader(BufReader::new(file))?;
        if metadata.len() != index.len() {
            return Err(Error::MetadataMismatch {
                index: index.len(),
                metadata: metadata.len(),
            });
        }

        debug!(vectors = index.len(), dimension = index.dimension(), "loaded vector store");
        Ok(Self {
            embedder,
            index,
            metadata,
        })
    }

    /// The `k` chunks nearest to `query`, ascending by squared L2 distance.
    /// Fewer than `k` results come back when the store is smaller than `k`.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Evidence>> {
        let vector = self.embedder.embed(query)?;
        let hits = self.index.search(&vector, k.min(self.len()))?;

        let mut results: Vec<Evidence> = hits
            .into_iter()
            .filter_map(|(label, distance)| {
                let chunk = usize::try_from(label).ok().and_then(|i| self.metadata.get(i))?;
                Some(Evidence {
                    record: chunk.to_article(),
                    chunk_id: Some(chunk.chunk_id),
                    score: Some(distance),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            let (a, b) = (a.score.unwrap_or(f32::INFINITY), b.score.unwrap_or(f32::INFINITY));
            a.total_cmp(&b)
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn chunk(id: &str, chunk_id: usize, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            title: format!("Article {}", id),
            chunk_id,
            text: text.to_string(),
            authors: vec![],
            source: None,
        }
    }

    #[test]
    fn test_dimension_mismatch_at_construction() {
        let result = VectorStore::new(HashEmbedder::new(16), 32);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 32, got: 16 })
        ));
    }

    #[test]
    fn test_batches_keep_alignment() {
        let mut store = VectorStore::new(HashEmbedder::new(32), 32).unwrap();
        let chunks: Vec<_> = (0..10)
            .map(|i| chunk(&i.to_string(), 0, &format!("gene{} variant{}", i, i)))
            .collect();
        store.add_in_batches(&chunks, 3).unwrap();

        assert_eq!(store.len(), 10);
        assert_eq!(store.metadata().len(), 10);
        let embedder = HashEmbedder::new(32);
        for (i, c) in store.metadata().iter().enumerate() {
            assert_eq!(store.index().vector(i).unwrap(), embedder.embed(&c.text).unwrap());
        }
    }

    #[test]
    fn test_metadata_length_mismatch_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("store.index");
        let metadata_path = dir.path().join("meta.json");

        let mut store = VectorStore::new(HashEmbedder::new(8), 8).unwrap();
        store
            .add_documents(&[chunk("1", 0, "alpha"), chunk("2", 0, "beta")])
            .unwrap();
        store.save(&index_path, &metadata_path).unwrap();

        let one = serde_json::to_string(&vec![chunk("1", 0, "alpha")]).unwrap();
        fs::write(&metadata_path, one).unwrap();
        assert!(matches!(
            VectorStore::load(HashEmbedder::new(8), &index_path, &metadata_path),
            Err(Error::MetadataMismatch { index: 2, metadata: 1 })
        ));
    }

    #[test]
    fn test_search_with_unbounded_k() {
        let mut store = VectorStore::new(HashEmbedder::new(8), 8).unwrap();
        store.add_documents(&[chunk("1", 0, "BRCA1 variant")]).unwrap();

        let results = store.search("BRCA1", usize::MAX).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "1");
    }

    #[test]
    fn test_load_rejects_other_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("store.index");
        let metadata_path = dir.path().join("meta.json");
        VectorStore::new(HashEmbedder::new(8), 8)
            .unwrap()
            .save(&index_path, &metadata_path)
            .unwrap();

        assert!(matches!(
            VectorStore::load(HashEmbedder::new(16), &index_path, &metadata_path),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
