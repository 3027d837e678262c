use genevidence::chunk::{chunk_articles, chunk_text, clean_text};
use genevidence::{ArticleRecord, ContextFormatter, Embedder, HashEmbedder, SemanticRetriever, Source, VectorStore};

const DIM: usize = 256;

fn corpus() -> Vec<ArticleRecord> {
    let texts = [
        ("1", "BRCA1 germline variants", "BRCA1 truncating variants raise hereditary breast and ovarian cancer risk."),
        ("2", "TP53 and Li-Fraumeni", "Germline TP53 missense variants cause Li-Fraumeni syndrome with early onset tumours."),
        ("3", "MYH14 hearing loss", "MYH14 variants were found in families with progressive sensorineural hearing loss."),
        ("4", "ASS1 deficiency", "Citrullinemia type I results from biallelic ASS1 variants affecting the urea cycle."),
    ];
    texts
        .iter()
        .map(|(id, title, text)| ArticleRecord {
            id: id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            authors: vec!["Doe Jane".to_string()],
            source: Some(Source::Pmc),
        })
        .collect()
}

fn built_store() -> VectorStore<HashEmbedder> {
    let chunks = chunk_articles(&corpus(), 40);
    let mut store = VectorStore::new(HashEmbedder::new(DIM), DIM).unwrap();
    store.add_in_batches(&chunks, 3).unwrap();
    store
}

#[test]
fn test_save_and_load_keep_vectors_and_metadata_aligned() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("faiss_index.bin");
    let metadata_path = dir.path().join("metadata.json");

    let store = built_store();
    assert!(store.len() > corpus().len());
    store.save(&index_path, &metadata_path).unwrap();

    let loaded = VectorStore::load(HashEmbedder::new(DIM), &index_path, &metadata_path).unwrap();
    assert_eq!(loaded.len(), store.len());
    assert_eq!(loaded.metadata(), store.metadata());

    let embedder = HashEmbedder::new(DIM);
    for (i, chunk) in loaded.metadata().iter().enumerate() {
        let expected = embedder.embed(&chunk.text).unwrap();
        assert_eq!(loaded.index().vector(i).unwrap(), expected.as_slice());
    }
}

#[test]
fn test_metadata_file_is_pretty_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let metadata_path = dir.path().join("metadata.json");
    built_store()
        .save(dir.path().join("faiss_index.bin"), &metadata_path)
        .unwrap();

    let raw = std::fs::read_to_string(&metadata_path).unwrap();
    assert!(raw.starts_with("[\n  {"));
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[0]["id"], "1");
    assert_eq!(value[0]["chunk_id"], 0);
}

#[test]
fn test_search_is_ordered_by_distance() {
    let store = built_store();
    let results = store.search("hearing loss MYH14", 5).unwrap();
    assert_eq!(results.len(), 5);

    let scores: Vec<f32> = results.iter().map(|e| e.score.unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(results[0].record.id, "3");
}

#[test]
fn test_k_larger_than_corpus_returns_whole_corpus() {
    let store = built_store();
    let retriever = SemanticRetriever::new(store);
    let total = retriever.store().len();

    let results = retriever.retrieve("variants", total + 10).unwrap();
    assert_eq!(results.len(), total);
    assert!(results.iter().all(|e| e.chunk_id.is_some()));
}

#[test]
fn test_unbounded_k_returns_whole_corpus() {
    let retriever = SemanticRetriever::new(built_store());
    let total = retriever.store().len();
    assert_eq!(retriever.retrieve("BRCA1", usize::MAX).unwrap().len(), total);
}

#[test]
fn test_empty_store_returns_nothing() {
    let store = VectorStore::new(HashEmbedder::new(DIM), DIM).unwrap();
    assert!(store.search("anything", 3).unwrap().is_empty());
}

#[test]
fn test_semantic_context_is_deterministic() {
    let retriever = SemanticRetriever::new(built_store());
    let formatter = ContextFormatter::new(Some(500));

    let first = formatter.format(&retriever.retrieve("urea cycle", 3).unwrap());
    let second = formatter.format(&retriever.retrieve("urea cycle", 3).unwrap());
    assert_eq!(first, second);
    assert_eq!(first.matches("Title: ").count(), 3);
}

#[test]
fn test_chunks_cover_cleaned_text() {
    let text = "BRCA1, a tumour-suppressor (DNA repair) gene!";
    let chunks = chunk_text(&clean_text(text), 12);
    assert!(chunks.iter().all(|c| !c.is_empty()));
    assert_eq!(chunks.join(" "), "BRCA1 a tumour-suppressor DNA repair gene");
}
