//! Manifest normalizer
//!
//! Turns raw completion output (JSON, fenced JSON, or bare markup) into a
//! [`Manifest`] that satisfies every invariant. Total: malformed input
//! degrades to a fallback manifest instead of failing.

use std::collections::HashSet;

use serde_json::Value;

use super::{
    ensure_doctype, is_html_name, FileEntry, Manifest, DEFAULT_ENTRY, MAX_FILES, MAX_FILE_BYTES,
    MAX_NAME_BYTES,
};

/// Size limits applied while normalizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Files kept per manifest
    pub max_files: usize,

    /// Per-file content budget in bytes
    pub max_file_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Limits {
    pub const DEFAULT: Limits = Limits {
        max_files: MAX_FILES,
        max_file_bytes: MAX_FILE_BYTES,
    };

    /// Upper bound on the JSON encoding of any manifest these limits admit
    ///
    /// serde_json writes at most 6 bytes per input byte (`\u00XX`); the
    /// framing allowances cover the object keys, quotes and separators.
    pub const fn max_encoded_bytes(&self) -> usize {
        const ESCAPED: usize = 6;
        const FRAMING: usize = 64;

        let name = ESCAPED * MAX_NAME_BYTES;
        let content = if self.max_file_bytes > usize::MAX / ESCAPED {
            usize::MAX
        } else {
            ESCAPED * self.max_file_bytes
        };
        let per_file = content.saturating_add(name + FRAMING);
        self.max_files
            .saturating_mul(per_file)
            .saturating_add(name + FRAMING)
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
        }
    }
}

/// Normalize with the default limits
pub fn normalize(raw: &str) -> Manifest {
    normalize_with(raw, &Limits::default())
}

/// Normalize raw completion output into a valid manifest
///
/// Steps:
/// 1. Strip one leading/trailing code fence
/// 2. Parse as JSON; anything but `{ files: [...] }` becomes a lone `index.html`
/// 3. Keep named entries, coerce content to strings, cap the file count
/// 4. Enforce the doctype on `.html` files, then the byte budget
/// 5. Resolve `entry` against the retained files
pub fn normalize_with(raw: &str, limits: &Limits) -> Manifest {
    let text = strip_code_fences(raw);

    let (requested_entry, candidates) = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(mut object)) if matches!(object.get("files"), Some(Value::Array(_))) => {
            let entry = match object.remove("entry") {
                Some(Value::String(entry)) => entry,
                _ => DEFAULT_ENTRY.to_string(),
            };
            let files = match object.remove("files") {
                Some(Value::Array(items)) => collect_files(items),
                _ => Vec::new(),
            };
            (entry, files)
        }
        _ => {
            tracing::debug!("Completion output is not a manifest, treating it as a single document");
            (
                DEFAULT_ENTRY.to_string(),
                vec![FileEntry::new(DEFAULT_ENTRY, text)],
            )
        }
    };

    let files: Vec<FileEntry> = candidates
        .into_iter()
        .take(limits.max_files)
        .map(|file| conform_file(file, limits.max_file_bytes))
        .collect();

    resolve_entry(requested_entry, files)
}

/// Remove a single leading and trailing code fence, then trim
///
/// The leading fence may carry a language tag (```json, ```html, ...).
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+'))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

// =============================================================================
// Private Helpers
// =============================================================================

/// Keep array elements with a non-empty string `name` of at most
/// `MAX_NAME_BYTES`, first occurrence wins
fn collect_files(items: Vec<Value>) -> Vec<FileEntry> {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(items.len());

    for item in items {
        let Value::Object(mut object) = item else {
            continue;
        };
        let name = match object.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => continue,
        };
        if name.len() > MAX_NAME_BYTES {
            tracing::debug!(bytes = name.len(), "Dropping file with an overlong name");
            continue;
        }
        if !seen.insert(name.clone()) {
            tracing::debug!(file = %name, "Dropping duplicate file name");
            continue;
        }
        let content = match object.remove("content") {
            Some(Value::String(content)) => content,
            _ => String::new(),
        };
        files.push(FileEntry { name, content });
    }

    files
}

/// Apply the doctype rule and the byte budget to one file
fn conform_file(mut file: FileEntry, max_bytes: usize) -> FileEntry {
    if is_html_name(&file.name) {
        file.content = ensure_doctype(&file.content);
        truncate_to(&mut file.content, max_bytes);
        // A cut may leave trailing whitespace that a second pass would trim
        let kept = file.content.trim_end().len();
        file.content.truncate(kept);
    } else {
        truncate_to(&mut file.content, max_bytes);
    }
    file
}

/// Truncate to at most `max_bytes`, backing off to a char boundary
fn truncate_to(content: &mut String, max_bytes: usize) {
    if content.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    content.truncate(cut);
}

fn resolve_entry(requested: String, files: Vec<FileEntry>) -> Manifest {
    if files.is_empty() {
        return Manifest::placeholder();
    }

    let entry = if files.iter().any(|f| f.name == requested) {
        requested
    } else {
        files
            .iter()
            .find(|f| f.is_html())
            .unwrap_or(&files[0])
            .name
            .clone()
    };

    Manifest { entry, files }
}
