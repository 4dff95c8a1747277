use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use hx_core::ChunkMetadata;

use crate::error::StorageError;

/// A variable-length sparse vector: parallel `indices`/`values` arrays,
/// compared by dot product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn new(indices: Vec<u32>, values: Vec<f32>) -> Self {
        Self { indices, values }
    }

    /// Dot product against another sparse vector. Builds a lookup map from
    /// whichever side is smaller so the cost is `O(min + max)` rather than
    /// `O(min * max)`.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (small, big) = if self.indices.len() <= other.indices.len() {
            (self, other)
        } else {
            (other, self)
        };
        let lookup: HashMap<u32, f32> = small
            .indices
            .iter()
            .copied()
            .zip(small.values.iter().copied())
            .collect();
        big.indices
            .iter()
            .zip(big.values.iter())
            .filter_map(|(idx, val)| lookup.get(idx).map(|sv| sv * val))
            .sum()
    }
}

/// The payload carried by every indexed chunk: enough to re-render a search
/// hit without a second round-trip to the source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub path: String,
    pub file_hash: String,
    pub chunk_text: String,
    pub metadata: ChunkMetadata,
}

/// A single record to upsert: one chunk's payload plus its two named vectors.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: String,
    pub payload: Payload,
    pub sparse: SparseVector,
    pub dense: Vec<f32>,
}

/// A filter for `delete`. The only shape the pipeline needs is "every point
/// whose payload path equals this file's relative path" — matching the
/// original's single `must: [{key: "path", match: {value: ...}}]` filter.
#[derive(Debug, Clone)]
pub enum PayloadFilter {
    PathEquals(String),
}

/// One half of a hybrid query: either channel embeds to a different shape,
/// so the request carries its own query type rather than a shared one.
#[derive(Debug, Clone)]
pub enum VectorQuery {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

/// A single entry in a `search_batch` call: a named-vector query, a top-k
/// limit, and (implicitly) payload inclusion — the reference store always
/// returns payloads with hits.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: VectorQuery,
    pub top_k: usize,
}

/// One ranked hit. Hits are returned best-first; `score` is channel-local
/// (cosine similarity for dense, dot product for sparse) and is NOT
/// comparable across channels — fusion happens one level up, in
/// `hx-index`'s `HybridIndex::search`, using rank rather than raw score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub payload: Payload,
    pub score: f32,
}

/// The vector-store seam: a key -> (payload, sparse, dense) map with
/// named-vector ANN search. Modeled on the original's Qdrant usage
/// (`create_collection` / `upsert` / `delete` / `search_batch`), with the
/// `code-index` collection carrying one dense channel (`text-dense`,
/// cosine) and one sparse channel (`text-sparse`, dot product).
pub trait VectorStore: Send + Sync {
    /// Idempotent schema creation: a second call with the same name is a no-op.
    fn create_collection(&mut self, name: &str, dense_dimension: usize) -> Result<(), StorageError>;

    /// Batch insert-or-replace by id.
    fn upsert(&mut self, name: &str, points: Vec<IndexPoint>) -> Result<(), StorageError>;

    /// Delete every point matching `filter`. Returns the number removed.
    fn delete(&mut self, name: &str, filter: &PayloadFilter) -> Result<usize, StorageError>;

    /// Run each request against `name`'s matching channel, returning one
    /// ranked hit list per request, in request order.
    fn search_batch(
        &self,
        name: &str,
        requests: &[SearchRequest],
    ) -> Result<Vec<Vec<SearchHit>>, StorageError>;
}

/// One collection's state: a usearch HNSW index for the dense channel (named
/// `text-dense`) and a flat map for the sparse channel (named `text-sparse`,
/// scored by linear-scan dot product — "in-memory index is acceptable" per
/// the sparse channel's spec allowance).
struct Collection {
    dense_dimension: usize,
    dense_index: Index,
    /// Monotonic key allocation so a removed-then-reinserted id never
    /// collides with a stale usearch key still pending removal.
    next_key: u64,
    id_to_key: HashMap<String, u64>,
    key_to_id: HashMap<u64, String>,
    sparse: HashMap<String, SparseVector>,
    payloads: HashMap<String, Payload>,
}

impl Collection {
    fn new(dense_dimension: usize) -> Result<Self, StorageError> {
        Ok(Self {
            dense_dimension,
            dense_index: create_dense_index(dense_dimension)?,
            next_key: 0,
            id_to_key: HashMap::new(),
            key_to_id: HashMap::new(),
            sparse: HashMap::new(),
            payloads: HashMap::new(),
        })
    }

    fn remove_point(&mut self, id: &str) -> Result<(), StorageError> {
        if let Some(key) = self.id_to_key.remove(id) {
            self.key_to_id.remove(&key);
            if self.dense_index.contains(key) {
                self.dense_index
                    .remove(key)
                    .map_err(|e| StorageError::VectorIndexUnavailable {
                        reason: format!("remove failed: {e}"),
                    })?;
            }
        }
        self.sparse.remove(id);
        self.payloads.remove(id);
        Ok(())
    }

    fn upsert_point(&mut self, point: IndexPoint) -> Result<(), StorageError> {
        if point.dense.len() != self.dense_dimension {
            return Err(StorageError::DimensionMismatch {
                expected: self.dense_dimension,
                actual: point.dense.len(),
            });
        }
        self.remove_point(&point.id)?;

        let key = self.next_key;
        self.next_key += 1;
        ensure_capacity(&mut self.dense_index)?;
        self.dense_index
            .add(key, &point.dense)
            .map_err(|e| StorageError::VectorIndexUnavailable {
                reason: format!("add failed: {e}"),
            })?;
        self.id_to_key.insert(point.id.clone(), key);
        self.key_to_id.insert(key, point.id.clone());
        self.sparse.insert(point.id.clone(), point.sparse);
        self.payloads.insert(point.id, point.payload);
        Ok(())
    }

    fn search_dense(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StorageError> {
        if query.len() != self.dense_dimension {
            return Err(StorageError::DimensionMismatch {
                expected: self.dense_dimension,
                actual: query.len(),
            });
        }
        if self.dense_index.size() == 0 {
            return Ok(Vec::new());
        }
        let matches = self
            .dense_index
            .search(query, top_k)
            .map_err(|e| StorageError::VectorIndexUnavailable {
                reason: format!("search failed: {e}"),
            })?;
        let hits = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(&key, &distance)| {
                let id = self.key_to_id.get(&key)?;
                let payload = self.payloads.get(id)?.clone();
                // usearch's Cos metric reports distance = 1 - cosine_similarity.
                Some(SearchHit {
                    id: id.clone(),
                    payload,
                    score: 1.0 - distance,
                })
            })
            .collect();
        Ok(hits)
    }

    fn search_sparse(&self, query: &SparseVector, top_k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<SearchHit> = self
            .sparse
            .iter()
            .filter_map(|(id, vector)| {
                let score = query.dot(vector);
                if score == 0.0 {
                    return None;
                }
                let payload = self.payloads.get(id)?.clone();
                Some(SearchHit {
                    id: id.clone(),
                    payload,
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

/// An in-process `VectorStore` backed by usearch (dense) and a linear-scan
/// dot-product map (sparse). No persistence: collections live only for the
/// lifetime of the process.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: HashMap<String, Collection>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Result<&Collection, StorageError> {
        self.collections
            .get(name)
            .ok_or_else(|| StorageError::UnknownCollection {
                name: name.to_string(),
            })
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection, StorageError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StorageError::UnknownCollection {
                name: name.to_string(),
            })
    }
}

impl VectorStore for InMemoryVectorStore {
    fn create_collection(&mut self, name: &str, dense_dimension: usize) -> Result<(), StorageError> {
        if self.collections.contains_key(name) {
            return Ok(());
        }
        self.collections
            .insert(name.to_string(), Collection::new(dense_dimension)?);
        Ok(())
    }

    #[tracing::instrument(skip(self, points), fields(collection = name, count = points.len()))]
    fn upsert(&mut self, name: &str, points: Vec<IndexPoint>) -> Result<(), StorageError> {
        let collection = self.collection_mut(name)?;
        for point in points {
            collection.upsert_point(point)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(collection = name))]
    fn delete(&mut self, name: &str, filter: &PayloadFilter) -> Result<usize, StorageError> {
        let collection = self.collection_mut(name)?;
        let PayloadFilter::PathEquals(path) = filter;
        let matching: Vec<String> = collection
            .payloads
            .iter()
            .filter(|(_, payload)| &payload.path == path)
            .map(|(id, _)| id.clone())
            .collect();
        let removed = matching.len();
        for id in matching {
            collection.remove_point(&id)?;
        }
        Ok(removed)
    }

    fn search_batch(
        &self,
        name: &str,
        requests: &[SearchRequest],
    ) -> Result<Vec<Vec<SearchHit>>, StorageError> {
        let collection = self.collection(name)?;
        requests
            .iter()
            .map(|req| match &req.query {
                VectorQuery::Dense(q) => collection.search_dense(q, req.top_k),
                VectorQuery::Sparse(q) => Ok(collection.search_sparse(q, req.top_k)),
            })
            .collect()
    }
}

/// HNSW config: cosine distance, M=32, ef_construction=200, ef_search=100.
fn create_dense_index(dimension: usize) -> Result<Index, StorageError> {
    let mut options = IndexOptions::default();
    options.dimensions = dimension;
    options.metric = MetricKind::Cos;
    options.quantization = ScalarKind::F32;
    options.connectivity = 32;
    options.expansion_add = 200;
    options.expansion_search = 100;

    Index::new(&options).map_err(|e| StorageError::VectorIndexUnavailable {
        reason: format!("failed to create index: {e}"),
    })
}

fn ensure_capacity(index: &mut Index) -> Result<(), StorageError> {
    if index.size() >= index.capacity() {
        let new_cap = (index.capacity() + 1).max(64) * 2;
        index
            .reserve(new_cap)
            .map_err(|e| StorageError::VectorIndexUnavailable {
                reason: format!("reserve failed: {e}"),
            })?;
    }
    Ok(())
}
