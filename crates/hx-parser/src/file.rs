use std::path::Path;

use hx_core::{ChunkMetadata, Language, Span};

use crate::chunker::{ChunkConfig, Chunker};
use crate::error::ParserError;
use crate::file_check::{check_file_size, is_binary};
use crate::registry::ParserRegistry;

/// Read, size-check, language-detect, parse, and chunk a single source file.
#[tracing::instrument(skip(config), fields(path = %path.display()))]
pub fn chunk_file(
    path: &Path,
    config: &ChunkConfig,
) -> Result<Vec<(Span, ChunkMetadata)>, ParserError> {
    let path_str = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let language = ParserRegistry::language_for_extension(extension).ok_or_else(|| {
        ParserError::UnsupportedLanguage {
            path: path_str.clone(),
        }
    })?;

    let metadata = std::fs::metadata(path).map_err(|e| ParserError::ParseFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    check_file_size(&path_str, metadata.len())?;

    let bytes = std::fs::read(path).map_err(|e| ParserError::ParseFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    if is_binary(&bytes) {
        return Err(ParserError::InvalidEncoding { path: path_str });
    }

    let grammar = ParserRegistry::grammar_for_extension(language, extension);
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| ParserError::LoaderError {
            language: language.name().to_string(),
            reason: e.to_string(),
        })?;
    let tree = parser.parse(&bytes, None).ok_or_else(|| ParserError::ParseFailed {
        path: path_str.clone(),
        reason: "tree-sitter returned no tree".to_string(),
    })?;
    if root_starts_with_error(&tree) {
        return Err(ParserError::ParseFailed {
            path: path_str,
            reason: "syntax error in source".to_string(),
        });
    }

    let chunker = Chunker::new(config.clone());
    chunker.chunk_tree(&tree, &bytes, language)
}

/// Convenience used by callers that already know the [`Language`] (e.g. the
/// watcher re-chunking a single changed file without re-resolving its extension).
pub fn chunk_source(
    source: &[u8],
    language: Language,
    config: &ChunkConfig,
) -> Result<Vec<(Span, ChunkMetadata)>, ParserError> {
    let ext = match language {
        Language::Python => "py",
        Language::TypeScript => "ts",
        Language::JavaScript => "js",
        Language::Rust => "rs",
        Language::Go => "go",
        Language::Java => "java",
    };
    let grammar = ParserRegistry::grammar_for_extension(language, ext);
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|e| ParserError::LoaderError {
            language: language.name().to_string(),
            reason: e.to_string(),
        })?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| ParserError::ParseFailed {
            path: String::new(),
            reason: "tree-sitter returned no tree".to_string(),
        })?;
    if root_starts_with_error(&tree) {
        return Err(ParserError::ParseFailed {
            path: String::new(),
            reason: "syntax error in source".to_string(),
        });
    }

    let chunker = Chunker::new(config.clone());
    chunker.chunk_tree(&tree, source, language)
}

/// A parse is treated as failed only when the root's first child is itself
/// an `ERROR` node — a lone stray error deeper in the tree (e.g. one bad
/// statement in an otherwise valid file) is tolerated and still chunked.
fn root_starts_with_error(tree: &tree_sitter::Tree) -> bool {
    tree.root_node()
        .child(0)
        .is_some_and(|child| child.kind() == "ERROR")
}
