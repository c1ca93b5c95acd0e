//! Page model.
//!
//! A [`Page`] is one unit of content: where it came from (`src`), where it
//! goes (`dest`), its merged metadata (`data`) and its render-stage
//! [`Content`].
//!
//! ```text
//!   src  /posts/hello .md      (immutable)
//!   dest /posts/hello/index .html  hash=…   (recomputed every pass)
//!   data { title, layout, url, slug, … }
//!   body     raw document, as loaded
//!   content  body → engines → layouts → processors
//! ```

use crate::pipeline::expand::PageGenerator;
use serde_json::{Map, Value};
use std::{fmt, sync::Arc};

/// Page metadata: front matter merged with inherited directory data.
pub type Data = Map<String, Value>;

/// Reserved data keys.
pub mod keys {
    pub const PERMALINK: &str = "permalink";
    pub const LAYOUT: &str = "layout";
    pub const TEMPLATE_ENGINE: &str = "templateEngine";
    pub const DRAFT: &str = "draft";
    pub const CONTENT: &str = "content";
    pub const URL: &str = "url";
    pub const SLUG: &str = "slug";
}

/// Render-stage content of a page.
#[derive(Clone)]
pub enum Content {
    /// Text document (templates, markdown, css, rendered html).
    Text(String),
    /// Non-UTF-8 asset passed through verbatim.
    Bytes(Vec<u8>),
    /// Lazy producer of derived pages, consumed by the expander.
    Generator(Arc<dyn PageGenerator>),
}

impl Content {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Empty content is never processed nor saved.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Generator(_) => false,
        }
    }

    pub const fn is_generator(&self) -> bool {
        matches!(self, Self::Generator(_))
    }

    /// Shared handle to the generator, if this is one.
    pub fn generator(&self) -> Option<Arc<dyn PageGenerator>> {
        match self {
            Self::Generator(generator) => Some(Arc::clone(generator)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes to hash and write; `None` for generators.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            Self::Generator(_) => None,
        }
    }

    /// Wrap loaded file bytes, keeping text when it is valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Bytes(err.into_bytes()),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Generator(_) => f.write_str("Generator"),
        }
    }
}

/// Source identity of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Src {
    /// Site-relative path without extension, e.g. `/posts/hello`
    pub path: String,
    /// Extension including the dot, e.g. `.md`
    pub ext: String,
}

impl fmt::Display for Src {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.ext)
    }
}

/// Output location of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dest {
    /// Destination-relative path without extension, e.g. `/posts/hello/index`
    pub path: String,
    /// Output extension, e.g. `.html`
    pub ext: String,
    /// Hex digest of the content last written for this page
    pub hash: Option<String>,
}

impl Dest {
    /// `path + ext`, relative to the destination root.
    pub fn file(&self) -> String {
        format!("{}{}", self.path, self.ext)
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub src: Src,
    pub dest: Dest,
    pub data: Data,
    /// Document body as loaded from disk (or a generator).
    pub body: Content,
    /// Current render-stage content.
    pub content: Content,
}

impl Page {
    /// Create a page whose destination starts out at its source path.
    pub fn new(src: Src, dest_ext: impl Into<String>, data: Data, body: Content) -> Self {
        let dest = Dest {
            path: src.path.clone(),
            ext: dest_ext.into(),
            hash: None,
        };
        Self {
            src,
            dest,
            data,
            content: body.clone(),
            body,
        }
    }

    /// Derive an independent page: same `src`/`dest`, data overlaid with `data`.
    pub fn duplicate(&self, data: Data) -> Self {
        let mut merged = self.data.clone();
        merged.extend(data);
        Self {
            src: self.src.clone(),
            dest: self.dest.clone(),
            data: merged,
            body: self.body.clone(),
            content: self.content.clone(),
        }
    }

    /// Drafts are skipped outside dev mode.
    pub fn is_draft(&self) -> bool {
        self.data.get(keys::DRAFT).is_some_and(is_truthy)
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.data_str(keys::URL)
    }
}

/// JavaScript-style truthiness for front matter flags.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Overlay `top` onto `base`, `top` winning on conflicts.
pub fn merge_data(base: &Data, top: &Data) -> Data {
    let mut merged = base.clone();
    merged.extend(top.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Data {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn page() -> Page {
        Page::new(
            Src {
                path: "/blog/index".into(),
                ext: ".md".into(),
            },
            ".html",
            data(json!({ "title": "Blog", "tags": ["a"] })),
            Content::from("# Blog"),
        )
    }

    #[test]
    fn test_new_page_dest_starts_at_src() {
        let page = page();
        assert_eq!(page.dest.path, "/blog/index");
        assert_eq!(page.dest.ext, ".html");
        assert_eq!(page.dest.file(), "/blog/index.html");
        assert!(page.dest.hash.is_none());
        assert_eq!(page.content.as_text(), Some("# Blog"));
    }

    #[test]
    fn test_duplicate_overlays_data() {
        let original = page();
        let child = original.duplicate(data(json!({ "title": "Page 2", "n": 2 })));

        assert_eq!(child.data["title"], "Page 2");
        assert_eq!(child.data["n"], 2);
        assert_eq!(child.data["tags"], json!(["a"]));
        assert_eq!(original.data["title"], "Blog");
        assert!(!original.data.contains_key("n"));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let original = page();
        let mut child = original.duplicate(Data::new());
        child.dest.path = "/blog/page/2/index".into();
        child.data.insert("extra".into(), json!(true));

        assert_eq!(original.dest.path, "/blog/index");
        assert!(!original.data.contains_key("extra"));
    }

    #[test]
    fn test_is_draft_truthiness() {
        let mut page = page();
        assert!(!page.is_draft());
        page.data.insert("draft".into(), json!(true));
        assert!(page.is_draft());
        page.data.insert("draft".into(), json!(0));
        assert!(!page.is_draft());
        page.data.insert("draft".into(), json!("yes"));
        assert!(page.is_draft());
    }

    #[test]
    fn test_content_from_bytes() {
        assert!(matches!(Content::from_bytes(b"abc".to_vec()), Content::Text(t) if t == "abc"));
        assert!(matches!(Content::from_bytes(vec![0xff, 0xfe]), Content::Bytes(_)));
    }

    #[test]
    fn test_content_is_empty() {
        assert!(Content::empty().is_empty());
        assert!(Content::Bytes(Vec::new()).is_empty());
        assert!(!Content::from("x").is_empty());
    }

    #[test]
    fn test_merge_data_top_wins() {
        let base = data(json!({ "a": 1, "b": 1 }));
        let top = data(json!({ "b": 2 }));
        let merged = merge_data(&base, &top);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }
}
