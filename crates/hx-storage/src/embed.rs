use crate::error::StorageError;
use crate::vector::SparseVector;

/// A dense embedding model: fixed-dimension real-valued vectors, compared by
/// cosine similarity. Sparse and dense models share no ABI (different output
/// shapes, different backing libraries), so each is represented as a
/// single-method trait rather than a shared interface — see `SparseEmbedder`.
pub trait DenseEmbedder: Send + Sync {
    /// Embed a batch of texts, one dense vector per input, in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StorageError>;

    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;
}

/// A sparse (lexical) embedding model: variable-length `(index, value)`
/// pairs, compared by dot product.
pub trait SparseEmbedder: Send + Sync {
    /// Embed a batch of texts, one sparse vector per input, in order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<SparseVector>, StorageError>;
}
