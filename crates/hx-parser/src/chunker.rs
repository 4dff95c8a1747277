use hx_core::{truncate_utf8_bytes, ChunkMetadata, Language, Span};
use tree_sitter::Node;

use crate::error::ParserError;
use crate::token_counter::TokenCounter;

/// Configuration for the syntactic chunking algorithm.
///
/// Grounded on `original_source/code_indexer/code_splitter.py::CodeSplitter`'s
/// constructor parameters.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub target_chunk_tokens: usize,
    pub max_chunk_tokens: usize,
    pub enforce_max_chunk_tokens: bool,
    pub coalesce_threshold: usize,
    pub token_model: String,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_chunk_tokens: 300,
            max_chunk_tokens: 1000,
            enforce_max_chunk_tokens: false,
            coalesce_threshold: 50,
            token_model: "gpt-4".to_string(),
        }
    }
}

impl From<&hx_core::IndexConfig> for ChunkConfig {
    fn from(cfg: &hx_core::IndexConfig) -> Self {
        Self {
            target_chunk_tokens: cfg.target_chunk_tokens,
            max_chunk_tokens: cfg.max_chunk_tokens,
            enforce_max_chunk_tokens: cfg.enforce_max_chunk_tokens,
            coalesce_threshold: cfg.coalesce_threshold,
            token_model: cfg.token_model.clone(),
        }
    }
}

/// Splits a parsed source file into `(Span, ChunkMetadata)` pairs using a
/// four-pass algorithm: recursive syntactic split, gap filling, coalescing,
/// and metadata decoration.
///
/// Grounded on `original_source/code_indexer/code_splitter.py::CodeSplitter::chunk_tree`.
pub struct Chunker {
    config: ChunkConfig,
    counter: TokenCounter,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        let counter = TokenCounter::new(config.token_model.clone());
        Self { config, counter }
    }

    /// Chunk `source` using the given parse `tree`, producing spans that
    /// together cover `[0, source.len())` with no gaps or overlaps once
    /// empty spans are filtered out.
    #[tracing::instrument(skip_all, fields(language = ?language))]
    pub fn chunk_tree(
        &self,
        tree: &tree_sitter::Tree,
        source: &[u8],
        language: Language,
    ) -> Result<Vec<(Span, ChunkMetadata)>, ParserError> {
        let mut chunks = self.chunk_node(tree.root_node(), source)?;

        // Pass 2: gap filling.
        chunks.retain(|s| !s.is_empty());
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if chunks.len() < 2 {
            let descriptor = language.descriptor();
            let single = chunks[0];
            let metadata = self.decorate(tree, source, single, language, &descriptor);
            return Ok(vec![(single, metadata)]);
        }
        chunks[0].start = 0;
        let last_index = chunks.len() - 1;
        for i in 0..last_index {
            let next_start = chunks[i + 1].start;
            chunks[i].end = next_start;
        }
        chunks[last_index].end = source.len();

        // Pass 3: coalescing.
        let mut coalesced = Vec::new();
        let mut agg = Span::empty_at(0);
        let mut agg_tokens = 0usize;
        for chunk in &chunks {
            let chunk_tokens = self.token_count(*chunk, source)?;
            if chunk_tokens > self.config.target_chunk_tokens {
                coalesced.push(agg);
                coalesced.push(*chunk);
                agg = Span::empty_at(chunk.end);
                agg_tokens = 0;
            } else if agg_tokens + chunk_tokens > self.config.target_chunk_tokens {
                coalesced.push(agg);
                agg = *chunk;
                agg_tokens = chunk_tokens;
            } else {
                agg = agg.concat(*chunk);
                agg_tokens += chunk_tokens;
                if agg_tokens > self.config.coalesce_threshold {
                    coalesced.push(agg);
                    agg = Span::empty_at(chunk.end);
                    agg_tokens = 0;
                }
            }
        }
        if !agg.is_empty() {
            coalesced.push(agg);
        }
        coalesced.retain(|s| !s.is_empty());

        // Pass 4: metadata decoration.
        let descriptor = language.descriptor();
        let mut final_chunks = Vec::with_capacity(coalesced.len());
        for span in coalesced {
            let metadata = self.decorate(tree, source, span, language, &descriptor);
            final_chunks.push((span, metadata));
        }
        Ok(final_chunks)
    }

    /// Pass 1: recursive syntactic split. Walks `node`'s children
    /// left-to-right, keeping a running `current` span; emits it (and
    /// recurses into the offending child) whenever a child alone, or the
    /// child appended to `current`, exceeds the target token budget.
    fn chunk_node(&self, node: Node, source: &[u8]) -> Result<Vec<Span>, ParserError> {
        let mut chunks = Vec::new();
        let mut current = Span::empty_at(node.start_byte());
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            let child_span = Span::new(child.start_byte(), child.end_byte());
            let child_tokens = self.token_count(child_span, source)?;
            let combined_tokens = child_tokens + self.token_count(current, source)?;

            if child_tokens > self.config.target_chunk_tokens {
                self.check_max(child_tokens)?;
                chunks.push(current);
                current = Span::empty_at(child.end_byte());
                chunks.extend(self.chunk_node(child, source)?);
            } else if combined_tokens > self.config.target_chunk_tokens {
                self.check_max(combined_tokens)?;
                chunks.push(current);
                current = child_span;
            } else {
                current = current.concat(child_span);
            }
        }

        let final_tokens = self.token_count(current, source)?;
        self.check_max(final_tokens)?;
        chunks.push(current);
        Ok(chunks)
    }

    fn check_max(&self, tokens: usize) -> Result<(), ParserError> {
        if self.config.enforce_max_chunk_tokens && tokens > self.config.max_chunk_tokens {
            return Err(ParserError::MaxChunkLengthExceeded {
                actual: tokens,
                max: self.config.max_chunk_tokens,
            });
        }
        Ok(())
    }

    fn token_count(&self, span: Span, source: &[u8]) -> Result<usize, ParserError> {
        self.counter.count_chunk(span, source, None)
    }

    fn decorate(
        &self,
        tree: &tree_sitter::Tree,
        source: &[u8],
        span: Span,
        language: Language,
        descriptor: &hx_core::LanguageDescriptor,
    ) -> ChunkMetadata {
        let start_line = line_number(source, span.start);
        let end_line = line_number(source, span.end.saturating_sub(1).max(span.start));

        let mut metadata = ChunkMetadata::new(start_line, end_line, language);
        if let Some(node) = tree
            .root_node()
            .descendant_for_byte_range(span.start, span.end)
        {
            // Functions and classes share one pre-order traversal so their
            // declaration order in `symbols` matches their order in source,
            // rather than grouping all functions before all classes.
            let symbol_node_types: Vec<&str> = descriptor
                .function_node_types
                .iter()
                .chain(descriptor.class_node_types.iter())
                .copied()
                .collect();
            metadata.symbols = extract_names(node, source, &symbol_node_types, descriptor);
            metadata.imports = extract_texts(node, source, descriptor.import_node_types);
        }
        metadata
    }
}

/// 0-indexed line number containing byte offset `index`.
fn line_number(source: &[u8], index: usize) -> usize {
    source[..index.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// Cap on a single symbol name stashed in `ChunkMetadata::symbols`.
const MAX_SYMBOL_TEXT_BYTES: usize = 256;

/// Cap on a single import statement's source text stashed in
/// `ChunkMetadata::imports`. Generous relative to a normal import line, but
/// bounded so a pathological generated file can't balloon payload size.
const MAX_IMPORT_TEXT_BYTES: usize = 1024;

/// Recursively collect the identifier text of every descendant node whose
/// kind is in `node_types`.
fn extract_names(
    node: Node,
    source: &[u8],
    node_types: &[&str],
    descriptor: &hx_core::LanguageDescriptor,
) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(node, source, node_types, descriptor, &mut names);
    names
}

fn collect_names(
    node: Node,
    source: &[u8],
    node_types: &[&str],
    descriptor: &hx_core::LanguageDescriptor,
    out: &mut Vec<String>,
) {
    if node_types.contains(&node.kind()) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            // Grammars name definitions with different node kinds
            // (`identifier`, `type_identifier`, `field_identifier`, ...);
            // `descriptor.identifier_node_type` covers the common case and
            // the suffix check catches the rest without a per-language table.
            if child.kind() == descriptor.identifier_node_type || child.kind().ends_with("identifier") {
                if let Ok(text) = child.utf8_text(source) {
                    out.push(truncate_utf8_bytes(text, MAX_SYMBOL_TEXT_BYTES).to_string());
                }
                break;
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_names(child, source, node_types, descriptor, out);
    }
}

/// Recursively collect the full source text of every descendant node whose
/// kind is in `node_types`.
fn extract_texts(node: Node, source: &[u8], node_types: &[&str]) -> Vec<String> {
    let mut texts = Vec::new();
    collect_texts(node, source, node_types, &mut texts);
    texts
}

fn collect_texts(node: Node, source: &[u8], node_types: &[&str], out: &mut Vec<String>) {
    if node_types.contains(&node.kind()) {
        if let Ok(text) = node.utf8_text(source) {
            out.push(truncate_utf8_bytes(text, MAX_IMPORT_TEXT_BYTES).to_string());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_texts(child, source, node_types, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ParserRegistry;

    fn parse(language: Language, ext: &str, source: &str) -> (tree_sitter::Tree, Vec<u8>) {
        let grammar = ParserRegistry::grammar_for_extension(language, ext);
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&grammar).unwrap();
        let tree = parser.parse(source, None).unwrap();
        (tree, source.as_bytes().to_vec())
    }

    #[test]
    fn chunks_cover_entire_buffer_with_no_gaps() {
        let source = "def a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n";
        let (tree, bytes) = parse(Language::Python, "py", source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker.chunk_tree(&tree, &bytes, Language::Python).unwrap();

        assert!(!chunks.is_empty());
        let mut offset = 0usize;
        for (span, _) in &chunks {
            assert_eq!(span.start, offset, "chunks must partition with no gaps");
            offset = span.end;
        }
        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn single_tiny_file_yields_one_chunk() {
        let source = "x = 1\n";
        let (tree, bytes) = parse(Language::Python, "py", source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker.chunk_tree(&tree, &bytes, Language::Python).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, Span::new(0, bytes.len()));
    }

    #[test]
    fn enforced_budget_rejects_oversized_chunk() {
        let body = "x = 1\n".repeat(2000);
        let source = format!("def big():\n{body}");
        let (tree, bytes) = parse(Language::Python, "py", &source);
        let config = ChunkConfig {
            target_chunk_tokens: 10,
            max_chunk_tokens: 20,
            enforce_max_chunk_tokens: true,
            ..ChunkConfig::default()
        };
        let chunker = Chunker::new(config);
        let err = chunker
            .chunk_tree(&tree, &bytes, Language::Python)
            .unwrap_err();
        assert!(matches!(err, ParserError::MaxChunkLengthExceeded { .. }));
    }

    #[test]
    fn metadata_captures_function_symbols() {
        let source = "def hello():\n    pass\n\ndef world():\n    pass\n";
        let (tree, bytes) = parse(Language::Python, "py", source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker.chunk_tree(&tree, &bytes, Language::Python).unwrap();
        let all_symbols: Vec<&String> = chunks.iter().flat_map(|(_, m)| &m.symbols).collect();
        assert!(all_symbols.iter().any(|s| s.as_str() == "hello"));
        assert!(all_symbols.iter().any(|s| s.as_str() == "world"));
    }

    #[test]
    fn metadata_captures_imports() {
        let source = "import os\nfrom sys import argv\n\ndef main():\n    pass\n";
        let (tree, bytes) = parse(Language::Python, "py", source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker.chunk_tree(&tree, &bytes, Language::Python).unwrap();
        let all_imports: Vec<&String> = chunks.iter().flat_map(|(_, m)| &m.imports).collect();
        assert!(all_imports.iter().any(|s| s.contains("import os")));
    }

    #[test]
    fn line_numbers_are_zero_indexed_and_end_inclusive() {
        let source = "a = 1\nb = 2\nc = 3\n";
        let (tree, bytes) = parse(Language::Python, "py", source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker.chunk_tree(&tree, &bytes, Language::Python).unwrap();
        assert_eq!(chunks[0].1.start_line, 0);
    }

    #[test]
    fn long_symbol_name_is_truncated_in_metadata() {
        let long_name = "x".repeat(500);
        let source = format!("def {long_name}():\n    pass\n");
        let (tree, bytes) = parse(Language::Python, "py", &source);
        let chunker = Chunker::new(ChunkConfig::default());
        let chunks = chunker
            .chunk_tree(&tree, &bytes, Language::Python)
            .unwrap();
        let all_symbols: Vec<&String> = chunks.iter().flat_map(|(_, m)| &m.symbols).collect();
        assert!(all_symbols
            .iter()
            .any(|s| s.len() == MAX_SYMBOL_TEXT_BYTES));
        assert!(all_symbols.iter().all(|s| s.len() <= MAX_SYMBOL_TEXT_BYTES));
    }
}
