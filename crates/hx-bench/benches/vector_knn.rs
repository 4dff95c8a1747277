use criterion::{criterion_group, criterion_main, Criterion};
use hx_storage::{IndexPoint, Payload, SearchRequest, SparseVector, VectorQuery, VectorStore};
use hx_storage::InMemoryVectorStore;
use hx_core::{ChunkMetadata, Language};

const COLLECTION: &str = "code-index";

/// Benchmark: dense k-NN search (target <10ms for 50K vectors, k=10).
fn bench_vector_knn(c: &mut Criterion) {
    let dimension = 384;
    let num_vectors = 50_000;

    let mut store = InMemoryVectorStore::new();
    store.create_collection(COLLECTION, dimension).unwrap();

    let points: Vec<IndexPoint> = (0..num_vectors)
        .map(|i| {
            let vector: Vec<f32> = (0..dimension)
                .map(|d| ((i * 7 + d * 13) as f32).sin())
                .collect();
            IndexPoint {
                id: format!("file_{i}.py_0"),
                payload: Payload {
                    path: format!("file_{i}.py"),
                    file_hash: "deadbeef".to_string(),
                    chunk_text: String::new(),
                    metadata: ChunkMetadata::new(0, 1, Language::Python),
                },
                sparse: SparseVector::default(),
                dense: vector,
            }
        })
        .collect();
    store.upsert(COLLECTION, points).unwrap();

    let query: Vec<f32> = (0..dimension)
        .map(|d| ((42 * 7 + d * 13) as f32).sin())
        .collect();

    let mut group = c.benchmark_group("vector_knn");

    group.bench_function("knn_k10_50k_384d", |b| {
        b.iter(|| {
            let requests = [SearchRequest {
                query: VectorQuery::Dense(query.clone()),
                top_k: 10,
            }];
            let _ = store.search_batch(COLLECTION, &requests);
        });
    });

    group.bench_function("knn_k50_50k_384d", |b| {
        b.iter(|| {
            let requests = [SearchRequest {
                query: VectorQuery::Dense(query.clone()),
                top_k: 50,
            }];
            let _ = store.search_batch(COLLECTION, &requests);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_vector_knn);
criterion_main!(benches);
