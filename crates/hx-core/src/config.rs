use std::path::PathBuf;

/// Single self-consistent configuration struct for the indexing pipeline.
///
/// Constructed explicitly by the embedding application and passed by
/// reference into `hx-index`'s pipeline entry points; there is no
/// environment-variable or file-based loader in scope.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Identifies the repository being indexed (used in log fields only).
    pub repo_id: String,
    pub root_path: PathBuf,
    /// Dimension of the dense embedding model's output vectors.
    pub dense_dimension: usize,
    /// Target token budget `T` per chunk (default 300).
    pub target_chunk_tokens: usize,
    /// Maximum token budget `M` per chunk (default 1000).
    pub max_chunk_tokens: usize,
    /// Whether to fail chunking when a chunk exceeds `max_chunk_tokens`.
    pub enforce_max_chunk_tokens: bool,
    /// Coalesce threshold `C` (default 50).
    pub coalesce_threshold: usize,
    /// Name of the tokenizer model used for budget accounting.
    pub token_model: String,
    /// Debounce delay for the watcher's trailing-edge flush, in milliseconds.
    pub debounce_delay_ms: u64,
    /// Batch size for vector-store upserts.
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            repo_id: String::new(),
            root_path: PathBuf::from("."),
            dense_dimension: 1024,
            target_chunk_tokens: 300,
            max_chunk_tokens: 1000,
            enforce_max_chunk_tokens: false,
            coalesce_threshold: 50,
            token_model: "gpt-4".to_string(),
            debounce_delay_ms: 1000,
            batch_size: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = IndexConfig::default();
        assert_eq!(cfg.target_chunk_tokens, 300);
        assert_eq!(cfg.max_chunk_tokens, 1000);
        assert_eq!(cfg.coalesce_threshold, 50);
        assert_eq!(cfg.debounce_delay_ms, 1000);
        assert!(!cfg.enforce_max_chunk_tokens);
    }
}
