//! Tera template engine.
//!
//! Pages and layouts are rendered as one-off templates. Every file under the
//! includes directory is preloaded under its relative name, so documents can
//! `{% include "nav.html" %}` or `{% import "macros.html" as m %}`.
//! [`Engine::refresh`] rebuilds that set at the start of every pipeline pass,
//! which keeps partials current in watch mode.
//!
//! Autoescaping is off: layouts splice already-rendered HTML through
//! `{{ content }}`. Use the `escape` filter where needed.

use super::{Engine, Filter, frontmatter};
use crate::page::Data;
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tera::Tera;
use walkdir::WalkDir;

pub struct TeraEngine {
    includes: PathBuf,
    /// Absolute includes directory to preload, if any
    templates_dir: Option<PathBuf>,
    tera: RwLock<Tera>,
    /// Kept so a refreshed `Tera` gets them again
    filters: Mutex<Vec<(String, Filter)>>,
}

/// Adapter from [`Filter`] to `tera::Filter`.
struct TeraFilter(Filter);

impl tera::Filter for TeraFilter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        (self.0)(value, args).map_err(|e| tera::Error::msg(format!("{e:#}")))
    }
}

impl TeraEngine {
    /// `includes` is relative to the source root; `src_root` enables preloading.
    pub fn new(includes: impl Into<PathBuf>, src_root: Option<&Path>) -> Self {
        let includes = includes.into();
        let templates_dir = src_root.map(|root| root.join(&includes));
        Self {
            includes,
            templates_dir,
            tera: RwLock::new(blank_tera()),
            filters: Mutex::new(Vec::new()),
        }
    }

    fn build_tera(&self) -> Result<Tera> {
        let mut tera = blank_tera();

        if let Some(dir) = self.templates_dir.as_deref().filter(|d| d.is_dir()) {
            let files: Vec<(PathBuf, Option<String>)> = WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| {
                    let name = e
                        .path()
                        .strip_prefix(dir)
                        .unwrap_or(e.path())
                        .to_string_lossy()
                        .replace('\\', "/");
                    (e.into_path(), Some(name))
                })
                .collect();
            tera.add_template_files(files)
                .with_context(|| format!("failed to load templates from {}", dir.display()))?;
        }

        for (name, filter) in self.filters.lock().iter() {
            tera.register_filter(name, TeraFilter(filter.clone()));
        }
        Ok(tera)
    }
}

fn blank_tera() -> Tera {
    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());
    tera
}

impl Engine for TeraEngine {
    fn load(&self, path: &Path) -> Result<Data> {
        frontmatter::load_file(path)
    }

    fn render(&self, content: &str, data: &Data, path: &Path) -> Result<String> {
        let context = tera::Context::from_serialize(data)
            .with_context(|| format!("invalid template data for {}", path.display()))?;
        self.tera
            .write()
            .render_str(content, &context)
            .with_context(|| format!("failed to render {}", path.display()))
    }

    fn add_filter(&self, name: &str, filter: Filter) {
        self.tera
            .write()
            .register_filter(name, TeraFilter(filter.clone()));
        self.filters.lock().push((name.to_owned(), filter));
    }

    fn includes(&self) -> &Path {
        &self.includes
    }

    fn refresh(&self) -> Result<()> {
        let tera = self.build_tera()?;
        *self.tera.write() = tera;
        Ok(())
    }
}
