use std::sync::Arc;

use hx_bench::fakes::{BagOfBytesSparseEmbedder, HashDenseEmbedder};
use hx_bench::fixture::create_five_language_project;
use hx_core::IndexConfig;
use hx_index::HybridIndex;
use hx_storage::InMemoryVectorStore;
use tempfile::TempDir;

fn open_index(root: std::path::PathBuf) -> HybridIndex<InMemoryVectorStore> {
    let config = IndexConfig {
        repo_id: "e2e-test".to_string(),
        root_path: root,
        dense_dimension: 256,
        batch_size: 1000,
        ..IndexConfig::default()
    };
    HybridIndex::open(
        &config,
        InMemoryVectorStore::new(),
        Arc::new(HashDenseEmbedder::new(256)),
        Arc::new(BagOfBytesSparseEmbedder),
    )
    .unwrap()
}

#[test]
fn e2e_full_index_search_across_languages() {
    hx_bench::tracing_init::init_test_tracing();
    let tmp = TempDir::new().unwrap();
    create_five_language_project(tmp.path());

    let mut index = open_index(tmp.path().to_path_buf());
    let indexed = index.index_files().unwrap();

    // All 8 source files across 5 languages should be indexed.
    assert!(indexed >= 8, "expected >=8 indexed files, got {indexed}");

    // --- Dense+sparse fused search for a Python class name ---
    let results = index.search("UserService business logic", 5).unwrap();
    assert!(!results.is_empty(), "should find UserService's file");
    assert!(results.iter().any(|r| r.path == "src/python/service.py"));

    // --- Search for a Go identifier ---
    let results = index.search("Router", 5).unwrap();
    assert!(!results.is_empty(), "should find a Go result for Router");

    // --- Cross-language term present in multiple files ---
    let results = index.search("process", 50).unwrap();
    assert!(!results.is_empty(), "should find 'process' in at least one language");

    // --- Every indexed file is reachable from the Merkle tree ---
    let tracked = index.tree().get_all_files();
    assert!(tracked
        .iter()
        .any(|p| p.ends_with("src/python/models.py")));
    assert!(tracked
        .iter()
        .any(|p| p.ends_with("src/typescript/server.ts")));
    assert!(tracked.iter().any(|p| p.ends_with("src/rust/engine.rs")));
    assert!(tracked.iter().any(|p| p.ends_with("src/go/handler.go")));
    assert!(tracked
        .iter()
        .any(|p| p.ends_with("src/java/Application.java")));
}

#[test]
fn e2e_search_is_deterministic_given_a_fixed_store() {
    hx_bench::tracing_init::init_test_tracing();
    let tmp = TempDir::new().unwrap();
    create_five_language_project(tmp.path());

    let mut index = open_index(tmp.path().to_path_buf());
    index.index_files().unwrap();

    let first = index.search("UserService", 5).unwrap();
    let second = index.search("UserService", 5).unwrap();
    assert_eq!(first, second, "search(q) must be deterministic for a fixed store");
}
