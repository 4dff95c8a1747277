use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use hx_core::{ChunkMetadata, IndexConfig, Language, Span};
use hx_merkle::MerkleTree;
use hx_parser::{chunk_source, check_file_size, is_binary, ChunkConfig, ParserError};
use hx_storage::{
    DenseEmbedder, IndexPoint, Payload, PayloadFilter, SearchHit, SearchRequest, SparseEmbedder,
    VectorQuery, VectorStore, COLLECTION_NAME,
};

use crate::error::IndexerError;
use crate::scanner::scan_files;

/// Default α for Reciprocal Rank Fusion.
const RRF_ALPHA: f64 = 60.0;

/// One fused search result: the file it came from, its RRF score, and the
/// Merkle hash of the file at index time (for staleness checks by callers).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub path: String,
    pub score: f64,
    pub file_hash: String,
}

/// Maps file chunks to vector-store entries and fuses dense/sparse searches.
///
/// Exclusively owns the [`MerkleTree`]; `Chunker` configuration is
/// immutable and stateless, so no per-language cache struct is needed
/// beyond the shared [`ChunkConfig`]. The vector store and both embedders
/// are external collaborators held behind trait objects.
pub struct HybridIndex<S: VectorStore> {
    root: PathBuf,
    chunk_config: ChunkConfig,
    tree: MerkleTree,
    store: S,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
}

impl<S: VectorStore> HybridIndex<S> {
    /// Build the Merkle tree over `config.root_path` and create the
    /// `code-index` collection (idempotent) in `store`.
    #[tracing::instrument(skip(config, store, dense, sparse), fields(root = %config.root_path.display()))]
    pub fn open(
        config: &IndexConfig,
        mut store: S,
        dense: Arc<dyn DenseEmbedder>,
        sparse: Arc<dyn SparseEmbedder>,
    ) -> Result<Self, IndexerError> {
        let tree = MerkleTree::build(&config.root_path)?;
        store.create_collection(COLLECTION_NAME, config.dense_dimension)?;
        Ok(Self {
            root: config.root_path.clone(),
            chunk_config: ChunkConfig::from(config),
            tree,
            store,
            dense,
            sparse,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Full bulk index: enumerate indexable files, parse+chunk them in
    /// parallel (the CPU-bound stage), then embed and upsert sequentially
    /// against the store. Per-file failures are logged and skipped; they do
    /// not abort the pass. Returns the count of files successfully indexed.
    #[tracing::instrument(skip(self))]
    pub fn index_files(&mut self) -> Result<usize, IndexerError> {
        let scan = scan_files(&self.root);
        let chunk_config = self.chunk_config.clone();
        let root = self.root.clone();
        let parent_span = tracing::Span::current();

        let parsed: Vec<(PathBuf, Vec<u8>, Vec<(Span, ChunkMetadata)>)> = scan
            .files
            .par_iter()
            .filter_map(|rel_path| {
                let _guard = tracing::debug_span!(
                    parent: &parent_span,
                    "chunk_file",
                    path = %rel_path.display()
                )
                .entered();
                let abs_path = root.join(rel_path);
                match chunk_path(&abs_path, rel_path, &chunk_config) {
                    Ok(Some((bytes, chunks))) => Some((rel_path.clone(), bytes, chunks)),
                    Ok(None) => None,
                    Err(err) => {
                        tracing::warn!(path = %rel_path.display(), error = %err, "skipping file during index_files");
                        None
                    }
                }
            })
            .collect();

        let mut indexed = 0usize;
        for (rel_path, bytes, chunks) in parsed {
            let abs_path = self.root.join(&rel_path);
            let rel_str = normalize_rel(&rel_path);
            if let Err(err) = self.tree.update_file(&abs_path) {
                tracing::warn!(path = %rel_str, error = %err, "failed to update merkle entry");
                continue;
            }
            if let Err(err) = self.upsert_chunks(&rel_str, &abs_path, &bytes, chunks) {
                tracing::warn!(path = %rel_str, error = %err, "failed to embed/upsert file");
                continue;
            }
            indexed += 1;
        }
        Ok(indexed)
    }

    /// Re-chunk a single file, delete all its existing store points, embed
    /// the new chunks, and upsert them. The delete-then-insert discipline is
    /// required because the chunk count may change and stale points must
    /// not survive. `UnsupportedLanguage` is a hard error here (explicit API
    /// use), unlike the silent skip in `index_files`.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn update_file(&mut self, path: &Path) -> Result<(), IndexerError> {
        let abs_path = self.to_absolute(path);
        let rel_str = normalize_rel(&self.to_relative(&abs_path));

        self.tree.update_file(&abs_path)?;

        let extension = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let language = Language::resolve(extension)?;

        let metadata = std::fs::metadata(&abs_path)?;
        check_file_size(&rel_str, metadata.len())?;
        let bytes = std::fs::read(&abs_path)?;
        if is_binary(&bytes) {
            return Err(ParserError::InvalidEncoding { path: rel_str }.into());
        }
        let chunks = chunk_source(&bytes, language, &self.chunk_config)?;

        self.store
            .delete(COLLECTION_NAME, &PayloadFilter::PathEquals(rel_str.clone()))?;
        self.upsert_chunks(&rel_str, &abs_path, &bytes, chunks)?;
        Ok(())
    }

    /// Deletes all store points for `path` and removes its Merkle leaf,
    /// re-hashing ancestors.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn delete_file(&mut self, path: &Path) -> Result<(), IndexerError> {
        let abs_path = self.to_absolute(path);
        let rel_str = normalize_rel(&self.to_relative(&abs_path));
        self.store
            .delete(COLLECTION_NAME, &PayloadFilter::PathEquals(rel_str))?;
        self.tree.remove_file(&abs_path);
        Ok(())
    }

    /// Embed `query` twice, issue two top-k ANN searches (dense cosine,
    /// sparse dot product), and fuse with Reciprocal Rank Fusion.
    #[tracing::instrument(skip(self, query))]
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>, IndexerError> {
        let batch = vec![query.to_string()];
        let dense_query = self
            .dense
            .embed_batch(&batch)?
            .into_iter()
            .next()
            .unwrap_or_default();
        let sparse_query = self
            .sparse
            .embed_batch(&batch)?
            .into_iter()
            .next()
            .unwrap_or_default();

        let requests = [
            SearchRequest {
                query: VectorQuery::Dense(dense_query),
                top_k: k,
            },
            SearchRequest {
                query: VectorQuery::Sparse(sparse_query),
                top_k: k,
            },
        ];
        let mut results = self.store.search_batch(COLLECTION_NAME, &requests)?;
        let sparse_hits = results.pop().unwrap_or_default();
        let dense_hits = results.pop().unwrap_or_default();

        Ok(fuse_rrf(&dense_hits, &sparse_hits, k))
    }

    fn to_absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn to_relative(&self, abs_path: &Path) -> PathBuf {
        abs_path
            .strip_prefix(&self.root)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| abs_path.to_path_buf())
    }

    fn upsert_chunks(
        &mut self,
        rel_path: &str,
        abs_path: &Path,
        bytes: &[u8],
        chunks: Vec<(Span, ChunkMetadata)>,
    ) -> Result<(), IndexerError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let file_hash = self.tree.get_node_hash(abs_path).unwrap_or_default();

        let texts: Vec<String> = chunks
            .iter()
            .map(|(span, _)| {
                span.try_extract(bytes)
                    .map(|b| String::from_utf8_lossy(b).into_owned())
            })
            .collect::<Result<Vec<_>, hx_core::CoreError>>()?;
        let dense_vectors = self.dense.embed_batch(&texts)?;
        let sparse_vectors = self.sparse.embed_batch(&texts)?;

        let points: Vec<IndexPoint> = chunks
            .into_iter()
            .map(|(_, metadata)| metadata)
            .zip(texts)
            .zip(dense_vectors)
            .zip(sparse_vectors)
            .enumerate()
            .map(|(ordinal, (((metadata, chunk_text), dense), sparse))| IndexPoint {
                id: format!("{rel_path}_{ordinal}"),
                payload: Payload {
                    path: rel_path.to_string(),
                    file_hash: file_hash.clone(),
                    chunk_text,
                    metadata,
                },
                sparse,
                dense,
            })
            .collect();

        self.store.upsert(COLLECTION_NAME, points)?;
        Ok(())
    }
}

/// Path-normalize to a forward-slash string for use as a chunk-id prefix and
/// payload path, independent of the host OS's path separator.
fn normalize_rel(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read, size/binary-check, and chunk a single file. Returns `Ok(None)` for
/// an unrecognized extension — `index_files`'s silent-skip policy — leaving
/// hard-error behavior to `update_file`'s explicit API use.
fn chunk_path(
    abs_path: &Path,
    rel_path: &Path,
    chunk_config: &ChunkConfig,
) -> Result<Option<(Vec<u8>, Vec<(Span, ChunkMetadata)>)>, IndexerError> {
    let extension = abs_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let Some(language) = Language::from_extension(extension) else {
        return Ok(None);
    };

    let rel_str = normalize_rel(rel_path);
    let metadata = std::fs::metadata(abs_path)?;
    check_file_size(&rel_str, metadata.len())?;

    let bytes = std::fs::read(abs_path)?;
    if is_binary(&bytes) {
        return Ok(None);
    }

    let chunks = chunk_source(&bytes, language, chunk_config)?;
    Ok(Some((bytes, chunks)))
}

/// Reciprocal Rank Fusion: `score = 1/(α + rank_dense) + 1/(α + rank_sparse)`,
/// unseen side's rank treated as infinity (contributing 0). Ranks are
/// 1-based, matching the original `_combine_results`.
fn fuse_rrf(dense: &[SearchHit], sparse: &[SearchHit], k: usize) -> Vec<SearchResult> {
    struct Entry<'a> {
        dense_rank: Option<usize>,
        sparse_rank: Option<usize>,
        hit: &'a SearchHit,
    }

    let mut ranks: HashMap<&str, Entry> = HashMap::new();
    for (i, hit) in dense.iter().enumerate() {
        ranks
            .entry(hit.id.as_str())
            .or_insert(Entry {
                dense_rank: None,
                sparse_rank: None,
                hit,
            })
            .dense_rank = Some(i + 1);
    }
    for (i, hit) in sparse.iter().enumerate() {
        ranks
            .entry(hit.id.as_str())
            .or_insert(Entry {
                dense_rank: None,
                sparse_rank: None,
                hit,
            })
            .sparse_rank = Some(i + 1);
    }

    let mut scored: Vec<(f64, &SearchHit)> = ranks
        .into_values()
        .map(|entry| {
            let dense_term = 1.0 / (RRF_ALPHA + entry.dense_rank.map_or(f64::INFINITY, |r| r as f64));
            let sparse_term =
                1.0 / (RRF_ALPHA + entry.sparse_rank.map_or(f64::INFINITY, |r| r as f64));
            (dense_term + sparse_term, entry.hit)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(score, hit)| SearchResult {
            path: hit.payload.path.clone(),
            score,
            file_hash: hit.payload.file_hash.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hx_storage::{InMemoryVectorStore, SparseVector};
    use std::fs;
    use std::sync::Mutex;

    /// Deterministic dense embedder for tests: a tiny hash-based projection.
    /// Not a stand-in for a real model — only needs to place similar text
    /// near similar vectors so ANN search is exercised meaningfully.
    struct FakeDenseEmbedder {
        dimension: usize,
    }

    impl DenseEmbedder for FakeDenseEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, hx_storage::StorageError> {
            Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        for (i, byte) in text.bytes().enumerate() {
            v[(byte as usize + i) % dim] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }

    /// Deterministic sparse embedder for tests: bag-of-bytes.
    struct FakeSparseEmbedder;

    impl SparseEmbedder for FakeSparseEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>, hx_storage::StorageError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut counts: HashMap<u32, f32> = HashMap::new();
                    for b in t.bytes() {
                        *counts.entry(b as u32).or_insert(0.0) += 1.0;
                    }
                    let indices = counts.keys().copied().collect();
                    let values = counts.values().copied().collect();
                    SparseVector::new(indices, values)
                })
                .collect())
        }
    }

    fn test_config(root: PathBuf) -> IndexConfig {
        IndexConfig {
            repo_id: "test".to_string(),
            root_path: root,
            dense_dimension: 16,
            target_chunk_tokens: 300,
            max_chunk_tokens: 1000,
            enforce_max_chunk_tokens: false,
            coalesce_threshold: 50,
            token_model: "gpt-4".to_string(),
            debounce_delay_ms: 1000,
            batch_size: 256,
        }
    }

    fn open_index(root: PathBuf) -> HybridIndex<InMemoryVectorStore> {
        let config = test_config(root);
        HybridIndex::open(
            &config,
            InMemoryVectorStore::new(),
            Arc::new(FakeDenseEmbedder { dimension: 16 }),
            Arc::new(FakeSparseEmbedder),
        )
        .unwrap()
    }

    #[test]
    fn index_files_then_search_finds_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("main.py"),
            "def handle_login(user):\n    return authenticate(user)\n",
        )
        .unwrap();

        let mut index = open_index(tmp.path().to_path_buf());
        let indexed = index.index_files().unwrap();
        assert_eq!(indexed, 1);

        let results = index.search("handle_login authenticate user", 5).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].path, "main.py");
    }

    #[test]
    fn update_file_replaces_stale_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("main.py");
        fs::write(&path, "def a():\n    pass\n").unwrap();

        let mut index = open_index(tmp.path().to_path_buf());
        index.index_files().unwrap();

        fs::write(&path, "def a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n").unwrap();
        index.update_file(&path).unwrap();

        let results = index.search("a b c", 10).unwrap();
        assert!(results.iter().any(|r| r.path == "main.py"));
    }

    #[test]
    fn delete_file_removes_store_points_and_merkle_leaf() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("main.py");
        fs::write(&path, "def a():\n    pass\n").unwrap();

        let mut index = open_index(tmp.path().to_path_buf());
        index.index_files().unwrap();
        assert!(index.tree().get_node_hash(&path).is_some());

        index.delete_file(&path).unwrap();
        assert!(index.tree().get_node_hash(&path).is_none());

        let results = index.search("a", 10).unwrap();
        assert!(results.iter().all(|r| r.path != "main.py"));
    }

    #[test]
    fn search_with_no_sparse_hits_still_ranks_by_dense() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.py"), "def alpha():\n    pass\n").unwrap();

        let mut index = open_index(tmp.path().to_path_buf());
        index.index_files().unwrap();

        // A sparse query with an index no stored vector has: dot product is
        // zero for everything, exercising the RRF unseen-side (rank = inf).
        let results = index.search("alpha", 5).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn unsupported_language_is_a_hard_error_in_update_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.bin");
        fs::write(&path, b"\x00\x01\x02").unwrap();

        let mut index = open_index(tmp.path().to_path_buf());
        let err = index.update_file(&path).unwrap_err();
        assert!(matches!(
            err,
            IndexerError::Core(hx_core::CoreError::UnsupportedLanguage { .. })
        ));
    }

    #[test]
    fn rrf_score_is_monotonic_in_rank() {
        let a = SearchHit {
            id: "a".to_string(),
            payload: Payload {
                path: "a.py".to_string(),
                file_hash: "h".to_string(),
                chunk_text: String::new(),
                metadata: ChunkMetadata::new(0, 1, Language::Python),
            },
            score: 1.0,
        };
        let b = SearchHit {
            id: "b".to_string(),
            payload: Payload {
                path: "b.py".to_string(),
                file_hash: "h".to_string(),
                chunk_text: String::new(),
                metadata: ChunkMetadata::new(0, 1, Language::Python),
            },
            score: 1.0,
        };
        let dense = vec![a, b];
        let sparse: Vec<SearchHit> = Vec::new();
        let fused = fuse_rrf(&dense, &sparse, 2);
        assert_eq!(fused[0].path, "a.py");
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn concurrent_search_during_update_observes_some_consistent_state() {
        // Not a true concurrency stress test (the store isn't Sync-shared
        // across threads here), but documents the expected eventual-
        // consistency contract: a search always sees either the pre- or
        // post-update point set for a file, never a partial one, because
        // `update_file` deletes-then-inserts within a single call.
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("main.py");
        fs::write(&path, "def a():\n    pass\n").unwrap();

        let index = Mutex::new(open_index(tmp.path().to_path_buf()));
        index.lock().unwrap().index_files().unwrap();
        let before = index.lock().unwrap().search("a", 5).unwrap();
        assert!(!before.is_empty());
    }
}
