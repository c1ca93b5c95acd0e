//! Source tree: the pages and data files found under the source root.
//!
//! ```text
//! src/
//! ├── _config.toml           ignored (`_` prefix)
//! ├── _data.yml              data of `/`          → every page
//! ├── _data/site.json        `site` key of `/`    → every page
//! ├── _includes/base.html    ignored (layouts)
//! ├── img/logo.png           static mapping, copied by the site
//! ├── style.css              asset (listed in `build.assets`)
//! ├── index.md               page
//! └── posts/
//!     ├── _data.yml          data of `/posts`     → pages below `/posts`
//!     └── hello.md           page
//! ```
//!
//! Pages inherit the data of every directory above them, nearer
//! directories first; a page's own front matter wins over all of it.

pub mod change;
pub mod loaders;

pub use change::{ChangeKind, classify, is_data_path, is_reserved_path};
pub use loaders::{Loader, Loaders};

use crate::{
    config::{CopyRule, PathResolver, SiteConfig, normalize_site_path},
    engine::Engines,
    log,
    page::{Content, Data, Page, Src, keys, merge_data},
    pipeline::expand::paginate_content,
    utils::path::extname,
};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{collections::BTreeMap, fs, path::Path};
use walkdir::{DirEntry, WalkDir};

const DATA_DIR: &str = "/_data/";

/// In-memory model of the source tree.
pub struct Source {
    paths: PathResolver,
    /// Extensions loaded as verbatim pages
    assets: Vec<String>,
    /// Site paths never loaded as pages
    ignore: Vec<String>,
    copies: Vec<CopyRule>,
    loaders: Loaders,
    /// Data file site path → parsed value
    data_files: BTreeMap<String, Value>,
    /// Document site path (`/posts/a.md`) → page
    pages: BTreeMap<String, Page>,
    /// Pages registered in code; they survive reloads
    added: Vec<Page>,
}

impl Source {
    pub fn new(config: &SiteConfig, paths: PathResolver) -> Self {
        let mut ignore: Vec<String> = config
            .build
            .ignore
            .iter()
            .map(|p| normalize_site_path(p))
            .collect();

        // A destination inside the source tree must not be read back
        if let Some(dest) = paths.site_path(paths.dest_root()).filter(|p| p != "/") {
            ignore.push(dest);
        }

        Self {
            paths,
            assets: config.build.assets.iter().map(|e| dotted(e)).collect(),
            ignore,
            copies: config.build.copy.clone(),
            loaders: Loaders::default(),
            data_files: BTreeMap::new(),
            pages: BTreeMap::new(),
            added: Vec::new(),
        }
    }

    pub fn ignore(&mut self, path: &str) {
        self.ignore.push(normalize_site_path(path));
    }

    pub fn copy(&mut self, rule: CopyRule) {
        self.copies.push(rule);
    }

    pub fn copies(&self) -> &[CopyRule] {
        &self.copies
    }

    pub fn set_loader(&mut self, exts: &[&str], loader: Loader) {
        self.loaders.set(exts, loader);
    }

    /// Register a page that does not come from a file (e.g. a generator).
    pub fn add_page(&mut self, page: Page) {
        self.added.push(page);
    }

    /// The static mapping containing `path`, as `(from, to)`.
    pub fn is_static(&self, path: &str) -> Option<(String, String)> {
        self.copies.iter().find_map(|rule| {
            let from = rule.source();
            within(path, &from).then(|| (from, rule.target()))
        })
    }

    /// Whether `path` is never loaded as a page.
    pub fn is_ignored(&self, path: &str) -> bool {
        is_reserved_path(path)
            || self.ignore.iter().any(|prefix| within(path, prefix))
            || self.is_static(path).is_some()
    }

    /// Replace the whole model with what is on disk.
    pub fn load_directory(&mut self, engines: &Engines) -> Result<()> {
        self.pages.clear();
        self.data_files.clear();

        let root = self.paths.src_root().to_path_buf();
        for path in self.collect_files(&root) {
            self.load_path(&path, engines)?;
        }
        log!("load"; "{} pages, {} data files", self.pages.len(), self.data_files.len());
        Ok(())
    }

    /// Reload one site path: a file, a directory, or something deleted.
    pub fn load_file(&mut self, path: &str, engines: &Engines) -> Result<()> {
        let file = self.paths.src(path);
        if file.is_dir() {
            for path in self.collect_files(&file) {
                self.load_path(&path, engines)?;
            }
        } else if file.is_file() {
            self.load_path(path, engines)?;
        } else {
            self.remove(path);
        }
        Ok(())
    }

    /// Every page, with inherited directory data applied.
    pub fn pages(&self) -> Vec<Page> {
        let dir_data = self.directory_data();
        self.pages
            .values()
            .chain(&self.added)
            .map(|page| {
                let mut page = page.clone();
                page.data = merge_data(&inherited(&dir_data, &page.src.path), &page.data);
                page
            })
            .collect()
    }

    fn collect_files(&self, dir: &Path) -> Vec<String> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.paths.site_path(entry.path()))
            .collect()
    }

    /// Prune ignored directories, but walk into `_data`.
    fn keep_entry(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        match self.paths.site_path(entry.path()) {
            Some(path) => is_data_path(&format!("{path}/")) || !self.is_ignored(&path),
            None => false,
        }
    }

    fn load_path(&mut self, path: &str, engines: &Engines) -> Result<()> {
        self.remove(path);

        if is_data_path(path) {
            return self.load_data_file(path);
        }
        if self.is_ignored(path) {
            return Ok(());
        }

        let file = self.paths.src(path);
        let page = if let Some(ext) = engines.ext_for(path) {
            let Some(engine) = engines.for_path(path).and_then(|e| e.first()) else {
                return Ok(());
            };
            let mut data = engine
                .load(&file)
                .with_context(|| format!("failed to load {path}"))?;
            let body = match data.remove(keys::CONTENT) {
                Some(Value::String(text)) => text,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let body = paginate_content(&data, &body)
                .with_context(|| format!("invalid pagination in {path}"))?
                .unwrap_or(Content::Text(body));
            Page::new(src(path, ext), ".html", data, body)
        } else {
            let ext = extname(path);
            if !self.assets.iter().any(|a| a == ext) {
                return Ok(());
            }
            let bytes = fs::read(&file).with_context(|| format!("failed to read {path}"))?;
            Page::new(src(path, ext), ext, Data::new(), Content::from_bytes(bytes))
        };

        self.pages.insert(path.to_owned(), page);
        Ok(())
    }

    fn load_data_file(&mut self, path: &str) -> Result<()> {
        let Some(loader) = self.loaders.get(extname(path)) else {
            return Ok(());
        };
        let value = loader(&self.paths.src(path)).with_context(|| format!("failed to load data {path}"))?;
        self.data_files.insert(path.to_owned(), value);
        Ok(())
    }

    /// Drop `path` and everything below it from the model.
    fn remove(&mut self, path: &str) {
        self.pages.retain(|key, _| !within(key, path));
        self.data_files.retain(|key, _| !within(key, path));
    }

    /// Directory site path → the data it contributes.
    fn directory_data(&self) -> FxHashMap<String, Data> {
        let mut dirs: FxHashMap<String, Data> = FxHashMap::default();
        for (path, value) in &self.data_files {
            let (owner, keys) = data_owner(path);
            let data = dirs.entry(owner).or_default();
            if keys.is_empty() {
                match value {
                    Value::Object(map) => data.extend(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
                    Value::Null => {}
                    _ => log!("warn"; "{path} is not a mapping, ignored"),
                }
            } else {
                insert_at(data, &keys, value.clone());
            }
        }
        dirs
    }
}

fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_owned()
    } else {
        format!(".{ext}")
    }
}

fn src(path: &str, ext: &str) -> Src {
    Src {
        path: path[..path.len() - ext.len()].to_owned(),
        ext: ext.to_owned(),
    }
}

/// `path` is `prefix` or lies below it.
fn within(path: &str, prefix: &str) -> bool {
    prefix == "/"
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Owning directory and key path of a data file.
///
/// ```text
/// /blog/_data.yml          → ("/blog", [])
/// /_data/site/nav.json     → ("/", ["site", "nav"])
/// ```
fn data_owner(path: &str) -> (String, Vec<String>) {
    if let Some(idx) = path.find(DATA_DIR) {
        let rest = &path[idx + DATA_DIR.len()..];
        let rest = &rest[..rest.len() - extname(rest).len()];
        let keys = rest.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect();
        return (dir_or_root(&path[..idx]), keys);
    }
    let dir = path.rsplit_once('/').map_or("", |(dir, _)| dir);
    (dir_or_root(dir), Vec::new())
}

fn dir_or_root(dir: &str) -> String {
    if dir.is_empty() { "/".into() } else { dir.to_owned() }
}

fn insert_at(map: &mut Data, keys: &[String], value: Value) {
    match keys {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let entry = map
                .entry(first.clone())
                .or_insert_with(|| Value::Object(Data::new()));
            if !entry.is_object() {
                *entry = Value::Object(Data::new());
            }
            if let Value::Object(inner) = entry {
                insert_at(inner, rest, value);
            }
        }
    }
}

/// Merge the data of every ancestor directory of `src_path`, root first.
fn inherited(dirs: &FxHashMap<String, Data>, src_path: &str) -> Data {
    let mut data = dirs.get("/").cloned().unwrap_or_default();
    let segments: Vec<&str> = src_path.split('/').filter(|s| !s.is_empty()).collect();
    let mut dir = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        dir.push('/');
        dir.push_str(segment);
        if let Some(extra) = dirs.get(&dir) {
            data.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::TagEngine;
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        source: Source,
        engines: Engines,
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "_config.toml", "");
        write(root, "_data.yml", "site: Ember\nlang: en\n");
        write(root, "_data/nav/main.json", r#"["home", "blog"]"#);
        write(root, "_includes/base.html", "{{ content }}");
        write(root, "img/logo.png", "png");
        write(root, "style.css", "body{}");
        write(root, "notes.txt", "not loaded");
        write(root, "index.md", "# Home");
        write(root, "posts/_data.yml", "lang: fr\nlayout: post.html\n");
        write(root, "posts/hello.md", "---\ntitle: Hello\nlayout: other.html\n---\nHi");
        write(root, "drafts/wip.md", "wip");

        let mut config = SiteConfig::default();
        config.root = root.to_path_buf();
        config.build.assets = vec!["css".into()];
        config.build.ignore = vec!["drafts/".into()];
        config.build.copy = vec![CopyRule::new("img", Some("assets".into()))];
        let source = Source::new(&config, config.paths().unwrap());

        let mut engines = Engines::new();
        engines.register(&[".md"], TagEngine::new("md"));

        Fixture { dir, source, engines }
    }

    fn find<'a>(pages: &'a [Page], src: &str) -> &'a Page {
        pages.iter().find(|p| p.src.to_string() == src).unwrap()
    }

    #[test]
    fn test_load_directory() {
        let mut f = fixture();
        f.source.load_directory(&f.engines).unwrap();
        let pages = f.source.pages();

        let mut srcs: Vec<String> = pages.iter().map(|p| p.src.to_string()).collect();
        srcs.sort();
        assert_eq!(srcs, vec!["/index.md", "/posts/hello.md", "/style.css"]);

        let css = find(&pages, "/style.css");
        assert_eq!(css.dest.ext, ".css");
        assert_eq!(css.body.as_text(), Some("body{}"));

        let index = find(&pages, "/index.md");
        assert_eq!(index.dest.ext, ".html");
        assert_eq!(index.body.as_text(), Some("# Home"));
        assert!(!index.data.contains_key("content"));
    }

    #[test]
    fn test_directory_data_inheritance() {
        let mut f = fixture();
        f.source.load_directory(&f.engines).unwrap();
        let pages = f.source.pages();

        let index = find(&pages, "/index.md");
        assert_eq!(index.data["site"], "Ember");
        assert_eq!(index.data["lang"], "en");
        assert_eq!(index.data["nav"]["main"], json!(["home", "blog"]));

        let hello = find(&pages, "/posts/hello.md");
        assert_eq!(hello.data["site"], "Ember");
        assert_eq!(hello.data["lang"], "fr");
        // front matter wins over directory data
        assert_eq!(hello.data["layout"], "other.html");
        assert_eq!(hello.data["title"], "Hello");
    }

    #[test]
    fn test_load_file_reload_and_delete() {
        let mut f = fixture();
        f.source.load_directory(&f.engines).unwrap();
        let root = f.dir.path().to_path_buf();

        write(&root, "posts/hello.md", "---\ntitle: Changed\n---\nHi");
        f.source.load_file("/posts/hello.md", &f.engines).unwrap();
        assert_eq!(find(&f.source.pages(), "/posts/hello.md").data["title"], "Changed");

        write(&root, "posts/_data.yml", "lang: de\n");
        f.source.load_file("/posts/_data.yml", &f.engines).unwrap();
        assert_eq!(find(&f.source.pages(), "/posts/hello.md").data["lang"], "de");

        fs::remove_file(root.join("posts/hello.md")).unwrap();
        f.source.load_file("/posts/hello.md", &f.engines).unwrap();
        assert!(!f.source.pages().iter().any(|p| p.src.path == "/posts/hello"));

        fs::remove_dir_all(root.join("_data")).unwrap();
        f.source.load_file("/_data/nav/main.json", &f.engines).unwrap();
        assert!(!find(&f.source.pages(), "/index.md").data.contains_key("nav"));
    }

    #[test]
    fn test_load_new_directory() {
        let mut f = fixture();
        f.source.load_directory(&f.engines).unwrap();
        write(f.dir.path(), "docs/a.md", "a");
        write(f.dir.path(), "docs/b/c.md", "c");

        f.source.load_file("/docs", &f.engines).unwrap();
        let pages = f.source.pages();
        find(&pages, "/docs/a.md");
        find(&pages, "/docs/b/c.md");
    }

    #[test]
    fn test_static_and_ignore_rules() {
        let mut f = fixture();
        assert_eq!(
            f.source.is_static("/img/logo.png"),
            Some(("/img".into(), "/assets".into()))
        );
        assert_eq!(f.source.is_static("/images/x.png"), None);
        assert!(f.source.is_ignored("/img/logo.png"));
        assert!(f.source.is_ignored("/drafts/wip.md"));
        assert!(f.source.is_ignored("/_includes/base.html"));
        assert!(f.source.is_ignored("/_site/index.html"));
        assert!(!f.source.is_ignored("/posts/hello.md"));

        f.source.ignore("posts");
        assert!(f.source.is_ignored("/posts/hello.md"));
    }

    #[test]
    fn test_paginate_front_matter_makes_generator() {
        let mut f = fixture();
        write(
            f.dir.path(),
            "blog.md",
            "---\nposts: [1, 2, 3]\npaginate:\n  key: posts\n  size: 2\n---\nlist",
        );
        f.source.load_directory(&f.engines).unwrap();
        assert!(find(&f.source.pages(), "/blog.md").body.is_generator());
    }

    #[test]
    fn test_added_pages_survive_reload() {
        let mut f = fixture();
        f.source.add_page(Page::new(
            Src {
                path: "/posts/feed".into(),
                ext: ".xml".into(),
            },
            ".xml",
            Data::new(),
            Content::from("<rss/>"),
        ));
        f.source.load_directory(&f.engines).unwrap();
        f.source.load_directory(&f.engines).unwrap();

        let pages = f.source.pages();
        let feed = find(&pages, "/posts/feed.xml");
        assert_eq!(feed.data["lang"], "fr");
    }

    #[test]
    fn test_data_owner() {
        assert_eq!(data_owner("/_data.yml"), ("/".into(), vec![]));
        assert_eq!(data_owner("/blog/_data.json"), ("/blog".into(), vec![]));
        assert_eq!(
            data_owner("/_data/site/nav.json"),
            ("/".into(), vec!["site".to_owned(), "nav".to_owned()])
        );
        assert_eq!(
            data_owner("/blog/_data/authors.yml"),
            ("/blog".into(), vec!["authors".to_owned()])
        );
    }

    #[test]
    fn test_within() {
        assert!(within("/img/a.png", "/img"));
        assert!(within("/img", "/img"));
        assert!(!within("/images/a.png", "/img"));
        assert!(within("/anything", "/"));
    }
}
