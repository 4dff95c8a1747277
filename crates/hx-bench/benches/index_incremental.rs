use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use hx_bench::fakes::{BagOfBytesSparseEmbedder, HashDenseEmbedder};
use hx_bench::fixture::create_scaled_project;
use hx_core::IndexConfig;
use hx_index::HybridIndex;
use hx_storage::InMemoryVectorStore;
use std::fs;
use tempfile::TempDir;

/// Benchmark: incremental single-file `update_file` against an already
/// bulk-indexed 1K-file project (200 per language).
fn bench_index_incremental(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_scaled_project(tmp.path(), 200);

    let config = IndexConfig {
        repo_id: "bench-repo".to_string(),
        root_path: tmp.path().to_path_buf(),
        dense_dimension: 256,
        batch_size: 1000,
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

    let target = tmp.path().join("src/python/mod_0.py");

    let mut group = c.benchmark_group("index_incremental");
    group.bench_function("incremental_single_file_update", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let new_content = format!(
                r#"
class Service0:
    """Modified service iteration {counter}."""

    def __init__(self, name: str):
        self.name = name

    def process(self, data: dict) -> dict:
        return {{"name": self.name, "iteration": {counter}}}

    def validate(self, input_val: str) -> bool:
        return len(input_val) > {counter}

def new_function_{counter}() -> int:
    return {counter}
"#
            );
            fs::write(&target, &new_content).unwrap();
            index.update_file(&target).unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_index_incremental);
criterion_main!(benches);
