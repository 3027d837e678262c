use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use genevidence::chunk::{chunk_text, clean_text};
use genevidence::index::FlatL2Index;
use genevidence::records::ChunkRecord;
use genevidence::{HashEmbedder, VectorStore};

const DIMENSIONS: usize = 384;
const NUM_VECTORS: usize = 10_000;
const NUM_QUERIES: usize = 10;

fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(2))
        .configure_from_args()
}

fn random_vectors(rng: &mut StdRng, n: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..DIMENSIONS).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn synthetic_abstract(rng: &mut StdRng, words: usize) -> String {
    const VOCAB: &[&str] = &[
        "BRCA1", "TP53", "variant", "missense", "germline", "hearing", "loss,", "syndrome",
        "(OMIM)", "cohort", "patients", "pathogenic", "de-novo", "exome", "sequencing.",
    ];
    (0..words)
        .map(|_| *VOCAB.choose(rng).unwrap())
        .collect::<Vec<_>>()
        .join(" ")
}

fn chunking(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let text = synthetic_abstract(&mut rng, 5_000);

    c.bench_function("clean_and_chunk_5000_words", |b| {
        b.iter(|| chunk_text(&clean_text(&text), 512))
    });
}

fn ingest(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let chunks: Vec<ChunkRecord> = (0..1_000)
        .map(|i| ChunkRecord {
            id: i.to_string(),
            title: format!("Article {}", i),
            chunk_id: 0,
            text: synthetic_abstract(&mut rng, 80),
            authors: vec![],
            source: None,
        })
        .collect();

    c.bench_function("embed_and_add_1000_chunks", |b| {
        b.iter(|| {
            let mut store = VectorStore::new(HashEmbedder::new(DIMENSIONS), DIMENSIONS).unwrap();
            store.add_in_batches(&chunks, 32).unwrap();
            store
        })
    });
}

fn search(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut index = FlatL2Index::new(DIMENSIONS);
    index.add(&random_vectors(&mut rng, NUM_VECTORS)).unwrap();
    let queries = random_vectors(&mut rng, NUM_QUERIES);

    let mut group = c.benchmark_group("flat_l2_search");
    for k in [1usize, 5, 50] {
        group.bench_with_input(
            BenchmarkId::new(format!("search_{}_queries", NUM_QUERIES), k),
            &k,
            |b, &k| {
                b.iter(|| {
                    for query in &queries {
                        let hits = index.search(query, k).unwrap();
                        assert_eq!(hits.len(), k);
                    }
                })
            },
        );
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = chunking, ingest, search
}
criterion_main!(benches);
