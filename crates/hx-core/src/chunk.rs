use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Metadata attached to a chunk by the chunker's final decoration pass.
///
/// Lines are 0-indexed; `end_line` is inclusive of the last line touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub start_line: usize,
    pub end_line: usize,
    pub language: Language,
    /// Identifiers declared at function/class definition nodes, pre-order.
    pub symbols: Vec<String>,
    /// Source text of import-statement nodes, pre-order.
    pub imports: Vec<String>,
}

impl ChunkMetadata {
    pub fn new(start_line: usize, end_line: usize, language: Language) -> Self {
        Self {
            start_line,
            end_line,
            language,
            symbols: Vec::new(),
            imports: Vec::new(),
        }
    }
}
