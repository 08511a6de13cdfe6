//! Document model
//!
//! A flat, index-addressable node table produced by a forgiving HTML
//! tokenizer. Parsed nodes keep their source text so untouched markup
//! serializes byte-for-byte; only replaced nodes are re-rendered.
//!
//! ## Node Table
//! ```text
//! ┌─────┬──────────────────────────────────────────────┐
//! │  0  │ Doctype   "<!doctype html>"                  │
//! │  1  │ Tag       <link rel=stylesheet href=a.css>   │
//! │  2  │ RawText   <script src=b.js> "" </script>     │
//! │  3  │ Text      "hello"                            │
//! │ ... │                                              │
//! └─────┴──────────────────────────────────────────────┘
//! ```
//! `script`, `style`, `textarea` and `title` bodies are captured whole with
//! their closing tag, so a script element is a single replaceable node.

/// Elements whose content is not markup
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// One attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Lowercased attribute name
    pub name: String,

    /// Value with quotes removed; `None` for bare attributes
    pub value: Option<String>,
}

/// A parsed start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Lowercased element name
    pub name: String,

    pub attrs: Vec<Attr>,

    /// Source text of the whole tag
    pub raw: String,
}

impl Tag {
    /// Value of the named attribute (first occurrence)
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// True when the whitespace-separated attribute value contains `token`
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.attr(name)
            .map(|v| v.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }
}

/// A node in the document table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `<!doctype ...>`
    Doctype(String),

    /// Comments, `<!...>` declarations and `<?...>` bogus comments
    Comment(String),

    /// Character data between tags
    Text(String),

    /// A start tag (void, self-closing, or opening a normal element)
    Tag(Tag),

    /// An end tag, kept as source text
    EndTag(String),

    /// A raw-text element: start tag, unparsed body, closing tag source
    RawText { tag: Tag, body: String, close: String },

    /// A synthesized element rendered from its parts
    Inline { name: String, attrs: Vec<Attr>, body: String },
}

/// A parsed document: nodes in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Document {
    /// Tokenize `source` into a node table. Never fails.
    pub fn parse(source: &str) -> Self {
        let mut nodes = Vec::new();
        let bytes = source.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos] != b'<' {
                let end = find_byte(bytes, pos, b'<').unwrap_or(bytes.len());
                nodes.push(Node::Text(source[pos..end].to_string()));
                pos = end;
                continue;
            }

            let rest = &bytes[pos..];
            if rest.starts_with(b"<!--") {
                let end = find_seq(bytes, pos + 4, b"-->").map(|i| i + 3).unwrap_or(bytes.len());
                nodes.push(Node::Comment(source[pos..end].to_string()));
                pos = end;
            } else if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
                let end = find_byte(bytes, pos, b'>').map(|i| i + 1).unwrap_or(bytes.len());
                let raw = source[pos..end].to_string();
                if starts_with_ignore_case(rest, b"<!doctype") {
                    nodes.push(Node::Doctype(raw));
                } else {
                    nodes.push(Node::Comment(raw));
                }
                pos = end;
            } else if rest.len() > 2 && rest[1] == b'/' && rest[2].is_ascii_alphabetic() {
                let end = find_byte(bytes, pos, b'>').map(|i| i + 1).unwrap_or(bytes.len());
                nodes.push(Node::EndTag(source[pos..end].to_string()));
                pos = end;
            } else if rest.len() > 1 && rest[1].is_ascii_alphabetic() {
                let (tag, end) = parse_tag(source, pos);
                pos = end;
                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                    let (body_end, close_end) = find_closing(bytes, pos, &tag.name);
                    nodes.push(Node::RawText {
                        tag,
                        body: source[pos..body_end].to_string(),
                        close: source[body_end..close_end].to_string(),
                    });
                    pos = close_end;
                } else {
                    nodes.push(Node::Tag(tag));
                }
            } else {
                // A lone '<' is text
                let end = find_byte(bytes, pos + 1, b'<').unwrap_or(bytes.len());
                nodes.push(Node::Text(source[pos..end].to_string()));
                pos = end;
            }
        }

        Self { nodes }
    }

    /// Write the node table back out as markup
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        out
    }
}

impl Node {
    /// Append this node's markup to `out`
    pub fn write_to(&self, out: &mut String) {
        match self {
            Node::Doctype(raw) | Node::Comment(raw) | Node::Text(raw) | Node::EndTag(raw) => {
                out.push_str(raw)
            }
            Node::Tag(tag) => out.push_str(&tag.raw),
            Node::RawText { tag, body, close } => {
                out.push_str(&tag.raw);
                out.push_str(body);
                out.push_str(close);
            }
            Node::Inline { name, attrs, body } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    if let Some(value) = &attr.value {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                out.push_str(body);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

// =============================================================================
// Tokenizer Helpers
// =============================================================================

/// Parse a start tag beginning at `start` (the '<'); returns the tag and the
/// offset just past its closing '>'
fn parse_tag(source: &str, start: usize) -> (Tag, usize) {
    let bytes = source.as_bytes();
    let mut pos = start + 1;

    let name_start = pos;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'/' && bytes[pos] != b'>' {
        pos += 1;
    }
    let name = source[name_start..pos].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        if bytes[pos] == b'>' {
            pos += 1;
            break;
        }

        let attr_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        // Guards against a stray '=' with no name
        if pos == attr_start {
            pos += 1;
            continue;
        }
        let attr_name = source[attr_start..pos].to_ascii_lowercase();

        let mut look = pos;
        while look < bytes.len() && bytes[look].is_ascii_whitespace() {
            look += 1;
        }
        if look < bytes.len() && bytes[look] == b'=' {
            pos = look + 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            let value = if pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos];
                let value_start = pos + 1;
                let value_end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                pos = (value_end + 1).min(bytes.len());
                source[value_start..value_end].to_string()
            } else {
                let value_start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                    pos += 1;
                }
                source[value_start..pos].to_string()
            };
            attrs.push(Attr { name: attr_name, value: Some(value) });
        } else {
            attrs.push(Attr { name: attr_name, value: None });
        }
    }

    let tag = Tag {
        name,
        attrs,
        raw: source[start..pos].to_string(),
    };
    (tag, pos)
}

/// Locate `</name` (any case) from `from`; returns (body end, close end)
fn find_closing(bytes: &[u8], from: usize, name: &str) -> (usize, usize) {
    let mut pos = from;
    while let Some(lt) = find_seq(bytes, pos, b"</") {
        let name_start = lt + 2;
        let name_end = name_start + name.len();
        if name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(name.as_bytes())
            && bytes
                .get(name_end)
                .map(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
                .unwrap_or(true)
        {
            let close_end = find_byte(bytes, name_end, b'>').map(|i| i + 1).unwrap_or(bytes.len());
            return (lt, close_end);
        }
        pos = lt + 2;
    }
    (bytes.len(), bytes.len())
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|b| *b == needle).map(|i| i + from)
}

fn find_seq(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn starts_with_ignore_case(bytes: &[u8], prefix: &[u8]) -> bool {
    bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
