//! Generator pages.
//!
//! A page whose content is a [`PageGenerator`] is expanded before rendering:
//!
//! ```text
//! /blog/archive  (Generator)
//!     │ generate(page data ∪ extra, filters)
//!     ├── Pages(iter) ─▶ /blog/archive  data ∪ item₁ ─▶ resolve_url
//!     │                  /blog/archive  data ∪ item₂ ─▶ resolve_url
//!     │                  …              (the generator page itself is dropped)
//!     └── Content(c)  ─▶ /blog/archive  content = c ─▶ resolve_url
//! ```
//!
//! The item sequence is drained once, in order.

use super::url::resolve_url;
use crate::{
    engine::FilterMap,
    page::{Content, Data, Page, keys, merge_data},
};
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Arc};

/// Lazily produced per-item data.
pub type Items = Box<dyn Iterator<Item = Result<Data>> + Send>;

/// What a generator returns.
pub enum Generated {
    /// One derived page per item, in sequence order.
    Pages(Items),
    /// Replacement content for the page itself.
    Content(Content),
}

impl Generated {
    /// Wrap an infallible item collection.
    pub fn pages<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Data>,
        I::IntoIter: Send + 'static,
    {
        Self::Pages(Box::new(items.into_iter().map(Ok)))
    }
}

/// Producer of derived pages (pagination, archives, tag indexes…).
pub trait PageGenerator: Send + Sync {
    fn generate(&self, data: &Data, filters: &FilterMap) -> Result<Generated>;
}

impl<F> PageGenerator for F
where
    F: Fn(&Data, &FilterMap) -> Result<Generated> + Send + Sync,
{
    fn generate(&self, data: &Data, filters: &FilterMap) -> Result<Generated> {
        self(data, filters)
    }
}

/// Expand one generator page into its concrete, URL-resolved pages.
pub fn expand(page: Page, extra: &Data, filters: &FilterMap, pretty_urls: bool) -> Result<Vec<Page>> {
    let Some(generator) = page.content.generator() else {
        let mut page = page;
        resolve_url(&mut page, pretty_urls);
        return Ok(vec![page]);
    };

    // The generator sees the page's own `url`/`slug` as well
    let mut probe = page.duplicate(Data::new());
    resolve_url(&mut probe, pretty_urls);
    let data = merge_data(&probe.data, extra);
    let generated = generator
        .generate(&data, filters)
        .with_context(|| format!("failed to expand {}", page.src))?;

    match generated {
        Generated::Pages(items) => {
            let mut pages = Vec::new();
            for item in items {
                let mut item = item.with_context(|| format!("failed to expand {}", page.src))?;
                let content = item.remove(keys::CONTENT).map(content_from_value);

                let mut child = page.duplicate(item);
                child.content = content.unwrap_or_default();
                resolve_url(&mut child, pretty_urls);
                pages.push(child);
            }
            Ok(pages)
        }
        Generated::Content(content) => {
            let mut page = page;
            page.content = content;
            resolve_url(&mut page, pretty_urls);
            Ok(vec![page])
        }
    }
}

fn content_from_value(value: Value) -> Content {
    match value {
        Value::String(text) => Content::Text(text),
        Value::Null => Content::empty(),
        other => Content::Text(other.to_string()),
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Splits an array from the page data into fixed-size pages.
///
/// Front matter form:
///
/// ```yaml
/// paginate:
///   key: posts          # array in the page data (site extra data included)
///   size: 10            # items per page
///   url: /blog/page/{n}/
///   first: /blog/       # optional URL of page 1
/// ```
///
/// Each generated page gets `results`, `pagination` and a `permalink`, and
/// renders the document body as its template.
#[derive(Debug, Clone)]
pub struct Paginate {
    pub key: String,
    pub size: usize,
    pub url: String,
    pub first: Option<String>,
    pub template: String,
}

const DEFAULT_SIZE: usize = 10;
const DEFAULT_URL: &str = "/page/{n}/";

impl Paginate {
    /// Build from a `paginate` front matter value, if present.
    pub fn from_front_matter(data: &Data, template: &str) -> Result<Option<Self>> {
        let Some(options) = data.get("paginate") else {
            return Ok(None);
        };
        let Value::Object(options) = options else {
            bail!("`paginate` must be a mapping");
        };

        let key = options
            .get("key")
            .and_then(Value::as_str)
            .context("`paginate.key` is required")?
            .to_owned();
        let size = match options.get("size") {
            None => DEFAULT_SIZE,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .context("`paginate.size` must be a positive integer")?
                as usize,
        };
        let url = options
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_URL)
            .to_owned();
        if !url.contains("{n}") {
            bail!("`paginate.url` must contain `{{n}}`");
        }
        let first = options.get("first").and_then(Value::as_str).map(str::to_owned);

        Ok(Some(Self {
            key,
            size,
            url,
            first,
            template: template.to_owned(),
        }))
    }

    fn page_url(&self, n: usize) -> Option<String> {
        match (n, &self.first) {
            (1, Some(first)) => Some(first.clone()),
            (1, None) => None,
            _ => Some(self.url.replace("{n}", &n.to_string())),
        }
    }
}

impl PageGenerator for Paginate {
    fn generate(&self, data: &Data, filters: &FilterMap) -> Result<Generated> {
        let results = match data.get(&self.key) {
            Some(Value::Array(items)) => items.clone(),
            None | Some(Value::Null) => Vec::new(),
            Some(_) => bail!("`{}` is not an array, cannot paginate it", self.key),
        };

        let chunks: Vec<Vec<Value>> = if results.is_empty() {
            vec![Vec::new()]
        } else {
            results.chunks(self.size).map(<[Value]>::to_vec).collect()
        };
        let total = chunks.len();

        // Links go through the `url` filter when one is registered
        let link = |n: usize| -> Result<Value> {
            let Some(url) = self.page_url(n) else {
                return Ok(data.get(keys::URL).cloned().unwrap_or(Value::Null));
            };
            match filters.get("url") {
                Some(filter) => filter(&Value::String(url), &HashMap::new()),
                None => Ok(Value::String(url)),
            }
        };

        let mut items = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let n = i + 1;
            let mut item = Data::new();
            item.insert("results".into(), Value::Array(chunk));
            let previous = if n > 1 { link(n - 1)? } else { Value::Null };
            let next = if n < total { link(n + 1)? } else { Value::Null };
            item.insert(
                "pagination".into(),
                json!({
                    "page": n,
                    "total_pages": total,
                    "previous": previous,
                    "next": next,
                }),
            );
            if let Some(url) = self.page_url(n) {
                item.insert(keys::PERMALINK.into(), Value::String(url));
            }
            item.insert(keys::CONTENT.into(), Value::String(self.template.clone()));
            items.push(item);
        }

        Ok(Generated::pages(items))
    }
}

/// Turn a loaded document into a generator page when its front matter asks.
pub fn paginate_content(data: &Data, body: &str) -> Result<Option<Content>> {
    Ok(Paginate::from_front_matter(data, body)?
        .map(|p| Content::Generator(Arc::new(p) as Arc<dyn PageGenerator>)))
}
