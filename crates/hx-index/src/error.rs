/// Errors from the indexing pipeline and watcher.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("merkle tree error: {0}")]
    Merkle(#[from] hx_merkle::MerkleError),

    #[error("parser error: {0}")]
    Parser(#[from] hx_parser::ParserError),

    #[error("storage error: {0}")]
    Storage(#[from] hx_storage::StorageError),

    #[error("{0}")]
    Core(#[from] hx_core::CoreError),

    #[error("watcher error: {0}")]
    Watcher(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    /// Distinguishes transient conditions (IO hiccup, store RPC failure) a
    /// caller may retry on the next flush from permanent ones (malformed
    /// parse, unsupported language) it should just log and skip.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Merkle(e) => e.is_retryable(),
            Self::Parser(e) => e.is_retryable(),
            Self::Storage(e) => e.is_retryable(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::Interrupted,
            Self::Core(e) => e.is_retryable(),
            Self::Watcher(_) => false,
        }
    }
}
