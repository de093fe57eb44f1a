//! Codebase knowledge scanner.
//!
//! Walks one or more codebase roots and extracts a lightweight inventory:
//! module references plus a flattened set of notable type/feature names.
//! Extraction is best-effort string scanning, not parsing — the snapshot
//! only needs to be good enough to suppress recommendations the codebase
//! already implements. `scan` runs at most once per run; the snapshot is
//! immutable afterwards and shared by reference.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::domain::models::{KnowledgeSnapshot, ModuleRef};

/// Source file extensions worth inventorying.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "ts", "tsx", "js", "go", "java", "kt", "rb", "cs", "cpp", "cc", "c", "h", "swift",
];

/// Declaration keywords whose following identifier is treated as a feature
/// name.
const DECLARATION_KEYWORDS: &[&str] = &[
    "struct", "enum", "trait", "interface", "class", "fn", "def", "function", "impl", "type",
];

/// Files larger than this are skipped; generated blobs add noise, not
/// features.
const MAX_FILE_BYTES: u64 = 512 * 1024;

/// Codebase scanner producing a [`KnowledgeSnapshot`].
pub struct KnowledgeScanner {
    ignore_dirs: Vec<String>,
}

impl KnowledgeScanner {
    pub fn new() -> Self {
        Self {
            ignore_dirs: vec![
                ".git".to_string(),
                ".svn".to_string(),
                "node_modules".to_string(),
                "target".to_string(),
                "dist".to_string(),
                "vendor".to_string(),
                "__pycache__".to_string(),
            ],
        }
    }

    /// Walk `roots` and build the snapshot.
    ///
    /// A missing or unreadable root is skipped with a warning, not fatal; an
    /// empty snapshot is valid.
    pub fn scan(&self, roots: &[PathBuf]) -> KnowledgeSnapshot {
        let mut modules = Vec::new();
        let mut features = BTreeSet::new();

        for root in roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "codebase root missing or not a directory, skipping");
                continue;
            }

            let walker = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| self.should_descend(e));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("error accessing entry: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                    continue;
                }
                if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_BYTES {
                    continue;
                }

                let path = entry.path().to_path_buf();
                let name = module_name(&path);
                modules.push(ModuleRef { name, path: path.clone() });

                match fs::read_to_string(&path) {
                    Ok(text) => extract_features(&text, &mut features),
                    Err(e) => warn!(path = %path.display(), "unreadable source file: {e}"),
                }
            }
        }

        debug!(
            modules = modules.len(),
            features = features.len(),
            "knowledge scan complete"
        );
        KnowledgeSnapshot {
            source_roots: roots.to_vec(),
            modules,
            features,
        }
    }

    fn should_descend(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return true;
        }
        entry
            .file_name()
            .to_str()
            .map_or(true, |name| !self.ignore_dirs.iter().any(|d| d == name))
    }
}

impl Default for KnowledgeScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Heuristic feature extraction: scan for declaration keywords and take the
/// identifier that follows. No parsing guarantees.
fn extract_features(text: &str, features: &mut BTreeSet<String>) {
    for line in text.lines() {
        let trimmed = line.trim_start();
        let mut words = trimmed.split_whitespace().peekable();
        while let Some(word) = words.next() {
            if !DECLARATION_KEYWORDS.contains(&word) {
                continue;
            }
            if let Some(next) = words.peek() {
                let ident: String = next
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if ident.len() >= 3 && !ident.chars().next().is_some_and(char::is_numeric) {
                    features.insert(ident);
                }
            }
        }
    }
}
