use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Language {
    Python = 0,
    TypeScript = 1,
    JavaScript = 2,
    Rust = 3,
    Go = 4,
    Java = 5,
}

impl Language {
    /// Map a file extension to a Language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::TypeScript),
            "js" => Some(Self::JavaScript),
            "jsx" => Some(Self::JavaScript),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// Like [`Language::from_extension`], but a hard error instead of a
    /// silent `None` — for call sites where an unrecognized extension
    /// should fail the call rather than be skipped.
    pub fn resolve(ext: &str) -> Result<Self, CoreError> {
        Self::from_extension(ext).ok_or_else(|| CoreError::UnsupportedLanguage {
            extension: ext.to_string(),
        })
    }

    /// The separator used in qualified names for this language.
    pub fn native_separator(self) -> &'static str {
        match self {
            Self::Rust => "::",
            Self::Go => ".",
            Self::Python | Self::TypeScript | Self::JavaScript | Self::Java => ".",
        }
    }

    pub fn from_ordinal(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Python),
            1 => Some(Self::TypeScript),
            2 => Some(Self::JavaScript),
            3 => Some(Self::Rust),
            4 => Some(Self::Go),
            5 => Some(Self::Java),
            _ => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
        }
    }

    /// The node-type sets the chunker's metadata-decoration pass matches against
    /// for this language's grammar. One record per language, no subtype hierarchy.
    pub fn descriptor(self) -> LanguageDescriptor {
        match self {
            Self::Python => LanguageDescriptor {
                function_node_types: &["function_definition"],
                class_node_types: &["class_definition"],
                import_node_types: &["import_statement", "import_from_statement"],
                identifier_node_type: "identifier",
            },
            Self::TypeScript | Self::JavaScript => LanguageDescriptor {
                function_node_types: &["function_declaration", "method_definition"],
                // `interface_declaration` only occurs in TypeScript source, but
                // sharing one descriptor for both grammars is harmless: it simply
                // never matches in a `.js` file's tree.
                class_node_types: &["class_declaration", "interface_declaration"],
                import_node_types: &["import_statement"],
                identifier_node_type: "identifier",
            },
            Self::Rust => LanguageDescriptor {
                function_node_types: &["function_item"],
                class_node_types: &["struct_item", "enum_item", "trait_item", "impl_item"],
                import_node_types: &["use_declaration"],
                identifier_node_type: "identifier",
            },
            Self::Go => LanguageDescriptor {
                function_node_types: &["function_declaration", "method_declaration"],
                // `type_declaration`'s own direct children are the `type`
                // keyword and a `type_spec` (or several, if parenthesized) —
                // the declared name sits one level deeper as `type_spec`'s
                // first child, so `type_spec` is the node the symbol walk
                // needs to match directly.
                class_node_types: &["type_spec"],
                import_node_types: &["import_declaration"],
                identifier_node_type: "identifier",
            },
            Self::Java => LanguageDescriptor {
                function_node_types: &["method_declaration"],
                class_node_types: &["class_declaration"],
                import_node_types: &["import_declaration"],
                identifier_node_type: "identifier",
            },
        }
    }
}

/// Per-language AST node-type sets used by the chunker's metadata-decoration pass.
///
/// Modeling languages this way (data, not a trait per language) keeps adding a
/// grammar a one-match-arm change instead of a new type.
#[derive(Debug, Clone, Copy)]
pub struct LanguageDescriptor {
    pub function_node_types: &'static [&'static str],
    pub class_node_types: &'static [&'static str],
    pub import_node_types: &'static [&'static str],
    pub identifier_node_type: &'static str,
}
