//! Template engine registry.
//!
//! Engines are pluggable: anything implementing [`Engine`] can be registered
//! for one or more file extensions. The registry also owns the template
//! filter table, forwarding every filter to every engine regardless of
//! which one was registered first.
//!
//! ```text
//! Engines
//! ├── ".md"    → [Markdown]
//! ├── ".html"  → [Tera]
//! ├── ".tera"  → [Tera]
//! └── filters  { "url" → fn, … }
//! ```
//!
//! Lookups are by extension suffix, so `.tmpl.html` and `.html` can both be
//! registered; the longest matching suffix wins.

pub mod frontmatter;
pub mod markdown;
pub mod tera;

use crate::{error::BuildError, page::Data};
use anyhow::Result;
use serde_json::Value;
use std::{collections::BTreeMap, collections::HashMap, path::Path, sync::Arc};

pub use self::markdown::MarkdownEngine;
pub use self::tera::TeraEngine;

/// A template filter: `(value, named args) -> value`.
pub type Filter = Arc<dyn Fn(&Value, &HashMap<String, Value>) -> Result<Value> + Send + Sync>;

/// Every registered filter, by name.
pub type FilterMap = BTreeMap<String, Filter>;

/// Pluggable document engine.
pub trait Engine: Send + Sync {
    /// Parse a document into data; the body is stored under `content`.
    fn load(&self, path: &Path) -> Result<Data>;

    /// Render `content` with `data`. `path` is the source file, for diagnostics.
    fn render(&self, content: &str, data: &Data, path: &Path) -> Result<String>;

    /// Make a filter available to templates rendered by this engine.
    fn add_filter(&self, name: &str, filter: Filter);

    /// Directory (relative to the source root) layouts are resolved against.
    fn includes(&self) -> &Path;

    /// Called once at the start of every pipeline pass.
    fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Extension → engines table plus the filter table.
#[derive(Default)]
pub struct Engines {
    /// Insertion-ordered so lookups are deterministic.
    entries: Vec<(String, Vec<Arc<dyn Engine>>)>,
    filters: FilterMap,
}

impl Engines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `engine` for `exts`, replacing what was there.
    pub fn register(&mut self, exts: &[&str], engine: Arc<dyn Engine>) {
        self.forward_filters(engine.as_ref());
        for ext in exts {
            let ext = normalize_ext(ext);
            match self.entry_mut(&ext) {
                Some(engines) => *engines = vec![Arc::clone(&engine)],
                None => self.entries.push((ext, vec![Arc::clone(&engine)])),
            }
        }
    }

    /// Add `engine` after the engines already registered for `exts`.
    pub fn append(&mut self, exts: &[&str], engine: Arc<dyn Engine>) {
        self.forward_filters(engine.as_ref());
        for ext in exts {
            let ext = normalize_ext(ext);
            match self.entry_mut(&ext) {
                Some(engines) => engines.push(Arc::clone(&engine)),
                None => self.entries.push((ext, vec![Arc::clone(&engine)])),
            }
        }
    }

    /// Register a filter and forward it to every engine.
    pub fn add_filter(&mut self, name: &str, filter: Filter) {
        for (_, engines) in &self.entries {
            for engine in engines {
                engine.add_filter(name, Arc::clone(&filter));
            }
        }
        self.filters.insert(name.to_owned(), filter);
    }

    pub const fn filters(&self) -> &FilterMap {
        &self.filters
    }

    /// Refresh every distinct engine once.
    pub fn refresh(&self) -> Result<()> {
        let mut seen: Vec<&Arc<dyn Engine>> = Vec::new();
        for engine in self.entries.iter().flat_map(|(_, engines)| engines) {
            if seen.iter().any(|s| Arc::ptr_eq(s, engine)) {
                continue;
            }
            engine.refresh()?;
            seen.push(engine);
        }
        Ok(())
    }

    /// Engines for the longest registered extension that `path` ends with.
    pub fn for_path(&self, path: &str) -> Option<&[Arc<dyn Engine>]> {
        self.entry_for(path).map(|(_, engines)| engines.as_slice())
    }

    /// The longest registered extension that `path` ends with.
    pub fn ext_for(&self, path: &str) -> Option<&str> {
        self.entry_for(path).map(|(ext, _)| ext.as_str())
    }

    fn entry_for(&self, path: &str) -> Option<&(String, Vec<Arc<dyn Engine>>)> {
        self.entries
            .iter()
            .filter(|(ext, _)| path.ends_with(ext.as_str()))
            .max_by_key(|(ext, _)| ext.len())
    }

    /// Engines registered for exactly `ext`.
    pub fn for_ext(&self, ext: &str) -> Option<&[Arc<dyn Engine>]> {
        let ext = normalize_ext(ext);
        self.entries
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, engines)| engines.as_slice())
    }

    /// Engines for a page: the `templateEngine` override if given, else by path.
    ///
    /// The override is a comma-separated list of names, each looked up as
    /// the `.<name>` extension.
    pub fn select(&self, path: &str, custom: Option<&str>) -> Result<Vec<Arc<dyn Engine>>> {
        let Some(custom) = custom else {
            return Ok(self.for_path(path).map(<[_]>::to_vec).unwrap_or_default());
        };

        let mut selected = Vec::new();
        for name in custom.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let engines = self
                .for_ext(name)
                .ok_or_else(|| BuildError::InvalidEngine(name.to_owned()))?;
            selected.extend(engines.iter().cloned());
        }
        Ok(selected)
    }

    fn entry_mut(&mut self, ext: &str) -> Option<&mut Vec<Arc<dyn Engine>>> {
        self.entries
            .iter_mut()
            .find(|(e, _)| e == ext)
            .map(|(_, engines)| engines)
    }

    fn forward_filters(&self, engine: &dyn Engine) {
        for (name, filter) in &self.filters {
            engine.add_filter(name, Arc::clone(filter));
        }
    }
}

/// `md` → `.md`; `.md` stays.
fn normalize_ext(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_owned()
    } else {
        format!(".{ext}")
    }
}

/// Extract the `templateEngine` override: a string, or an array of names.
pub fn engine_override(data: &Data) -> Option<String> {
    match data.get(crate::page::keys::TEMPLATE_ENGINE)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(names) => Some(
            names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    }
}
