/// Errors shared across the hybrid-index crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid span [{start}, {end}) for buffer of length {buffer_len}")]
    InvalidSpan {
        start: usize,
        end: usize,
        buffer_len: usize,
    },

    #[error("unsupported language for extension '{extension}'")]
    UnsupportedLanguage { extension: String },
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
