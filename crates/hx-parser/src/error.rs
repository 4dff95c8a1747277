/// Parser and chunker errors.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("unsupported language for file: {path}")]
    UnsupportedLanguage { path: String },

    #[error("file too large ({size} bytes, max {max}): {path}")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("invalid encoding (non-UTF-8): {path}")]
    InvalidEncoding { path: String },

    #[error("parse failed for {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("tiktoken model not supported: {model}")]
    UnsupportedModel { model: String },

    #[error("chunk token length {actual} exceeds maximum {max}")]
    MaxChunkLengthExceeded { actual: usize, max: usize },

    #[error("failed to load tree-sitter grammar for {language:?}: {reason}")]
    LoaderError { language: String, reason: String },
}

impl ParserError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
