use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hx_core::Span;
use tiktoken_rs::CoreBPE;

use crate::error::ParserError;

/// Counts model-tokenized lengths of byte ranges, caching one `CoreBPE`
/// encoder per model name behind a read-mostly lock.
///
/// Grounded on the original `tiktoken.encoding_for_model` lazy-cache-by-name
/// pattern: the first call for a given model pays the cost of loading the
/// encoder; every subsequent call for that model reuses it.
pub struct TokenCounter {
    default_model: String,
    cache: RwLock<HashMap<String, Arc<CoreBPE>>>,
}

impl TokenCounter {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of tokens `text` encodes to under `model` (or the default model).
    pub fn count(&self, text: &str, model: Option<&str>) -> Result<usize, ParserError> {
        let model = model.unwrap_or(&self.default_model);
        let bpe = self.bpe_for(model)?;
        // `encode_ordinary` never special-cases marker strings like
        // `<|endoftext|>` that happen to occur in source text — they are
        // encoded as ordinary bytes, never recognized as sentinel ids.
        Ok(bpe.encode_ordinary(text).len())
    }

    /// Number of tokens the bytes covered by `span` encode to.
    pub fn count_chunk(
        &self,
        span: Span,
        source: &[u8],
        model: Option<&str>,
    ) -> Result<usize, ParserError> {
        let bytes = span.extract(source);
        let text = std::str::from_utf8(bytes).map_err(|_| ParserError::InvalidEncoding {
            path: String::new(),
        })?;
        self.count(text, model)
    }

    fn bpe_for(&self, model: &str) -> Result<Arc<CoreBPE>, ParserError> {
        if let Some(bpe) = self.cache.read().unwrap().get(model) {
            return Ok(bpe.clone());
        }

        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|_| {
            ParserError::UnsupportedModel {
                model: model.to_string(),
            }
        })?;
        let bpe = Arc::new(bpe);
        self.cache
            .write()
            .unwrap()
            .insert(model.to_string(), bpe.clone());
        Ok(bpe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nonzero_tokens_for_code() {
        let counter = TokenCounter::new("gpt-4");
        let n = counter.count("fn hello() { println!(\"world\"); }", None).unwrap();
        assert!(n > 0 && n < 20);
    }

    #[test]
    fn unsupported_model_is_reported() {
        let counter = TokenCounter::new("gpt-4");
        let err = counter.count("hello", Some("not-a-real-model")).unwrap_err();
        assert!(matches!(err, ParserError::UnsupportedModel { .. }));
    }

    #[test]
    fn repeated_calls_reuse_cached_encoder() {
        let counter = TokenCounter::new("gpt-4");
        let a = counter.count("one two three", None).unwrap();
        let b = counter.count("one two three", None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn count_chunk_matches_count_on_same_bytes() {
        let counter = TokenCounter::new("gpt-4");
        let source = b"def hello():\n    pass\n";
        let span = Span::new(0, source.len());
        let chunk_count = counter.count_chunk(span, source, None).unwrap();
        let text_count = counter
            .count(std::str::from_utf8(source).unwrap(), None)
            .unwrap();
        assert_eq!(chunk_count, text_count);
    }
}
