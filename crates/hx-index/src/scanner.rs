use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Generated file patterns to skip.
pub(crate) const GENERATED_PATTERNS: &[&str] = &[
    ".generated.",
    ".min.js",
    ".min.css",
    "_pb2.py",
    ".pb.go",
];

/// Vendor directories to skip.
pub(crate) const VENDOR_DIRS: &[&str] = &[
    "vendor",
    "node_modules",
    "third_party",
    ".venv",
    "venv",
];

/// Result of scanning a project directory for source files.
pub struct ScanResult {
    /// Paths relative to project root (forward-slash normalized).
    pub files: Vec<PathBuf>,
    /// Total entries seen (including skipped).
    pub total_entries: usize,
}

/// Scan a project directory for indexable source files.
///
/// Uses the `ignore` crate for .gitignore-aware walking.
/// Applies additional filtering: vendor dirs, generated patterns, hidden dirs, symlinks.
pub fn scan_files(project_root: &Path) -> ScanResult {
    let mut files = Vec::new();
    let mut total_entries = 0usize;

    let walker = WalkBuilder::new(project_root)
        .hidden(true) // skip hidden files/dirs
        .git_ignore(true) // respect .gitignore
        .git_global(true)
        .git_exclude(true)
        .follow_links(false) // skip symlinks
        .filter_entry(|entry| {
            // Prune vendor directories at the directory level
            if entry.file_type().map_or(false, |ft| ft.is_dir()) {
                if let Some(name) = entry.file_name().to_str() {
                    return !VENDOR_DIRS.contains(&name);
                }
            }
            true
        })
        .build();

    for entry in walker {
        // Skip entries that produce errors (permission denied, etc.)
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        total_entries += 1;

        // Only process regular files
        let ft = match entry.file_type() {
            Some(ft) => ft,
            None => continue,
        };
        if !ft.is_file() {
            continue;
        }

        let path = entry.path();

        // Skip generated file patterns
        if is_generated_file(path) {
            continue;
        }

        // Compute relative path (forward-slash normalized)
        let rel = match path.strip_prefix(project_root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };

        files.push(rel);
    }

    ScanResult {
        files,
        total_entries,
    }
}

/// Check if a filename matches generated file patterns.
fn is_generated_file(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy(),
        None => return false,
    };

    for pattern in GENERATED_PATTERNS {
        if name.contains(pattern) {
            return true;
        }
    }
    false
}
