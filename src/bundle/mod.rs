//! Bundle Module
//!
//! Produces one self-contained document from a [`Manifest`] by inlining
//! stylesheet links and external scripts that name files of the same
//! manifest. The result needs no file server, so it can be rendered in an
//! isolated preview frame.
//!
//! Matching is exact on the file name: no path resolution, no globbing.
//! References to anything else are left as they are.

mod dom;

pub use dom::{Attr, Document, Node, Tag};

use crate::manifest::{ensure_doctype, Manifest, DOCTYPE};

/// Document used when a manifest has no HTML file at all
pub const EMPTY_DOCUMENT: &str = "<!doctype html><title>Empty</title>";

/// Bundle a manifest into a single renderable document. Never fails.
pub fn bundle(manifest: &Manifest) -> String {
    let entry = manifest
        .entry_file()
        .or_else(|| manifest.first_html())
        .map(|f| f.content.as_str())
        .unwrap_or(EMPTY_DOCUMENT);

    let mut document = Document::parse(&ensure_doctype(entry));
    let inlined = inline_references(&mut document, manifest);

    tracing::debug!(
        entry = %manifest.entry,
        inlined,
        nodes = document.nodes.len(),
        "Bundled preview document"
    );

    render(&document)
}

/// Replace matching `<link rel=stylesheet>` and `<script src>` nodes in place
///
/// Returns the number of replaced nodes.
pub fn inline_references(document: &mut Document, manifest: &Manifest) -> usize {
    let mut replaced = 0;

    for node in document.nodes.iter_mut() {
        let inline = match node {
            Node::Tag(tag) if tag.name == "link" && tag.has_token("rel", "stylesheet") => tag
                .attr("href")
                .and_then(|href| manifest.file(href))
                .map(|file| Node::Inline {
                    name: "style".to_string(),
                    attrs: carry_attrs(tag, &["media"]),
                    body: escape_raw_text(&file.content, "style"),
                }),
            Node::RawText { tag, .. } if tag.name == "script" => tag
                .attr("src")
                .and_then(|src| manifest.file(src))
                .map(|file| Node::Inline {
                    name: "script".to_string(),
                    attrs: carry_attrs(tag, &["type"]),
                    body: escape_raw_text(&file.content, "script"),
                }),
            _ => None,
        };

        if let Some(inline) = inline {
            *node = inline;
            replaced += 1;
        }
    }

    replaced
}

/// Serialize with the canonical doctype in front
///
/// Source doctypes and the whitespace that led up to the first real node
/// are dropped so the output has exactly one doctype.
fn render(document: &Document) -> String {
    let mut out = String::with_capacity(DOCTYPE.len() + 1);
    out.push_str(DOCTYPE);
    out.push('\n');

    let mut leading = true;
    for node in &document.nodes {
        match node {
            Node::Doctype(_) => continue,
            Node::Text(text) if leading && text.trim().is_empty() => continue,
            _ => leading = false,
        }
        node.write_to(&mut out);
    }
    out
}

fn carry_attrs(tag: &Tag, names: &[&str]) -> Vec<Attr> {
    tag.attrs
        .iter()
        .filter(|a| names.contains(&a.name.as_str()))
        .cloned()
        .collect()
}

/// Keep inlined content from closing its own element early
fn escape_raw_text(content: &str, element: &str) -> String {
    let needle = format!("</{}", element);
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    let mut pos = 0;

    while pos + needle.len() <= bytes.len() {
        if bytes[pos..pos + needle.len()].eq_ignore_ascii_case(needle.as_bytes()) {
            out.push_str(&content[last..pos]);
            out.push_str("<\\/");
            last = pos + 2;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    out.push_str(&content[last..]);
    out
}
