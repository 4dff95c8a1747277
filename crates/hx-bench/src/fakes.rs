use std::collections::HashMap;

use hx_storage::{DenseEmbedder, SparseEmbedder, SparseVector, StorageError};

/// Deterministic stand-in for a real dense embedding model: a byte-hash
/// projection into a fixed dimension, L2-normalized so cosine search behaves
/// sensibly. Exists purely to drive benches/e2e tests without a network call
/// or a model download — it is not meant to produce meaningful similarity
/// rankings beyond "identical text maps to an identical vector".
pub struct HashDenseEmbedder {
    dimension: usize,
}

impl HashDenseEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl DenseEmbedder for HashDenseEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StorageError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension];
                for (i, byte) in text.bytes().enumerate() {
                    vector[(byte as usize + i) % self.dimension] += 1.0;
                }
                let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in vector.iter_mut() {
                        *x /= norm;
                    }
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic bag-of-bytes sparse embedder, paired with
/// [`HashDenseEmbedder`] for the same reason: no real lexical model in scope
/// for benches/e2e tests, only a stand-in that produces varied, comparable
/// sparse vectors.
pub struct BagOfBytesSparseEmbedder;

impl SparseEmbedder for BagOfBytesSparseEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>, StorageError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut counts: HashMap<u32, f32> = HashMap::new();
                for byte in text.bytes() {
                    *counts.entry(byte as u32).or_insert(0.0) += 1.0;
                }
                let indices = counts.keys().copied().collect();
                let values = counts.values().copied().collect();
                SparseVector::new(indices, values)
            })
            .collect())
    }
}
