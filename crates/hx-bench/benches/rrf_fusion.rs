use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use hx_bench::fakes::{BagOfBytesSparseEmbedder, HashDenseEmbedder};
use hx_bench::fixture::create_scaled_project;
use hx_core::IndexConfig;
use hx_index::HybridIndex;
use hx_storage::InMemoryVectorStore;
use tempfile::TempDir;

/// Benchmark: end-to-end `search` (two ANN queries + Reciprocal Rank Fusion)
/// against a 1K-file, already-indexed project.
fn bench_rrf_fusion(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_scaled_project(tmp.path(), 200);

    let config = IndexConfig {
        repo_id: "bench-repo".to_string(),
        root_path: tmp.path().to_path_buf(),
        dense_dimension: 256,
        ..IndexConfig::default()
    };

    let mut index = HybridIndex::open(
        &config,
        InMemoryVectorStore::new(),
        Arc::new(HashDenseEmbedder::new(256)),
        Arc::new(BagOfBytesSparseEmbedder),
    )
    .unwrap();
    index.index_files().unwrap();

    let mut group = c.benchmark_group("rrf_fusion");
    group.bench_function("search_top10_1k_files", |b| {
        b.iter(|| {
            let hits = index.search("process validate transform", 10).unwrap();
            criterion::black_box(hits);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_rrf_fusion);
criterion_main!(benches);
