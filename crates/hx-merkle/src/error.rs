/// Errors from Merkle tree construction and mutation.
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MerkleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::Interrupted,
        }
    }
}
