/// Errors from the vector store and embedding seams.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unknown collection '{name}'")]
    UnknownCollection { name: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index unavailable: {reason}")]
    VectorIndexUnavailable { reason: String },

    #[error("embedding model failed: {reason}")]
    Embedding { reason: String },
}

impl StorageError {
    /// Distinguishes transient store/model conditions (safe to retry on the
    /// next flush) from permanent ones (schema mismatch, bad input).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VectorIndexUnavailable { .. } | Self::Embedding { .. }
        )
    }
}
