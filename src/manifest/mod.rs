//! Manifest Module
//!
//! The canonical multi-file project description and the normalizer that
//! shapes untrusted completion output into one.
//!
//! ## Invariants (after normalization)
//! - `files.len() <= max_files`, first-N kept in original order
//! - every file name is non-empty, at most `MAX_NAME_BYTES`, and unique
//! - every content fits the per-file byte budget
//! - every `.html` file starts with `<!doctype html>` (case-insensitive)
//! - `entry` names a member of `files`

mod normalize;

use serde::{Deserialize, Serialize};

pub use normalize::{normalize, normalize_with, strip_code_fences, Limits};

/// Canonical doctype line prepended to HTML documents
pub const DOCTYPE: &str = "<!doctype html>";

/// Default entry document name
pub const DEFAULT_ENTRY: &str = "index.html";

/// Default cap on files per manifest
pub const MAX_FILES: usize = 32;

/// Default per-file content budget (800 KB)
pub const MAX_FILE_BYTES: usize = 800 * 1024;

/// Longest file name kept by the normalizer
pub const MAX_NAME_BYTES: usize = 255;

/// One file of a generated project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub content: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// True when the name ends in `.html` (any case)
    pub fn is_html(&self) -> bool {
        is_html_name(&self.name)
    }
}

/// A multi-file project: an entry document plus its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entry: String,
    pub files: Vec<FileEntry>,
}

impl Manifest {
    /// Single `index.html` holding only the doctype
    pub fn placeholder() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            files: vec![FileEntry::new(DEFAULT_ENTRY, DOCTYPE)],
        }
    }

    /// Look up a file by exact name
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }

    /// The entry file, if `entry` names a member
    pub fn entry_file(&self) -> Option<&FileEntry> {
        self.file(&self.entry)
    }

    /// First file whose name ends in `.html`
    pub fn first_html(&self) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.is_html())
    }

    /// Serialize to the JSON shape the completion service is asked for
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// True when `name` ends in `.html`, ignoring ASCII case
pub fn is_html_name(name: &str) -> bool {
    let suffix = b".html";
    let bytes = name.as_bytes();
    bytes.len() >= suffix.len() && bytes[bytes.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// True when the trimmed text begins with `<!doctype html>` (any case)
pub fn has_doctype(content: &str) -> bool {
    let trimmed = content.trim_start().as_bytes();
    trimmed.len() >= DOCTYPE.len() && trimmed[..DOCTYPE.len()].eq_ignore_ascii_case(DOCTYPE.as_bytes())
}

/// Trim `content` and make sure it opens with the doctype
pub fn ensure_doctype(content: &str) -> String {
    let trimmed = content.trim();
    if has_doctype(trimmed) {
        trimmed.to_string()
    } else {
        format!("{}\n{}", DOCTYPE, trimmed)
    }
}
