//! Site orchestration: registries, full builds and incremental updates.
//!
//! # Architecture
//!
//! ```text
//! Site
//!  ├── engines      extension → engines, filters
//!  ├── processors   output extension → processors
//!  ├── events       event → listeners
//!  ├── scripts      name → steps
//!  ├── source       pages + data files
//!  └── gate         destination → digest
//!
//! build()                              update(files)
//!   beforeBuild ── veto ─▶ Aborted       beforeUpdate ── veto ─▶ Aborted
//!   clean dest (build.clean)             classify each file
//!   copy static mappings                   data/content ─▶ source.load_file
//!   source.load_directory                  static       ─▶ copy one file
//!   pipeline tail                          ignored      ─▶ nothing
//!   afterBuild                           pipeline tail
//!                                        afterUpdate
//! ```
//!
//! Registration takes `&mut self`; a pass only reads the registries.

use crate::{
    config::{CopyRule, PathResolver, SiteConfig},
    engine::{Engine, Engines, Filter, MarkdownEngine, TeraEngine},
    error::BuildError,
    events::{Event, EventKind, Events, Listener, ScriptListener},
    log,
    page::{Data, Page, is_truthy},
    pipeline::{Pipeline, Processor, Processors, SaveStats, save::SaveGate},
    scripts::Scripts,
    source::{ChangeKind, Loader, Source, classify},
    utils::{minify::MinifyType, path},
};
use anyhow::{Context, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde_json::Value;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::Path,
    sync::Arc,
};
use walkdir::WalkDir;

/// Outcome of [`Site::build`] and [`Site::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// A `before*` listener vetoed the pass; nothing was touched.
    Aborted,
    Completed(SaveStats),
}

pub struct Site {
    config: SiteConfig,
    paths: PathResolver,
    engines: Engines,
    processors: Processors,
    events: Events,
    scripts: Arc<Scripts>,
    source: Source,
    gate: SaveGate,
    pool: ThreadPool,
    /// Site-wide data: `[extra]` plus [`Site::data`]
    extra: Data,
    /// Pages emitted by the last pass
    pages: Vec<Page>,
}

impl Site {
    /// Create a site with the default engines, loaders, filters and the
    /// scripts and events of `config`.
    pub fn new(config: SiteConfig) -> Result<Self> {
        let paths = config.paths()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.build.concurrency)
            .build()
            .context("failed to start the worker pool")?;

        let scripts = Arc::new(Scripts::new(config.get_root()));
        for (name, steps) in &config.scripts {
            scripts.set(name.clone(), steps.clone());
        }

        let mut source = Source::new(&config, paths.clone());
        source.ignore(&config.build.includes.to_string_lossy().replace('\\', "/"));

        let mut site = Self {
            extra: config.extra.clone(),
            paths,
            engines: Engines::new(),
            processors: Processors::new(),
            events: Events::new(),
            scripts,
            source,
            gate: SaveGate::new(),
            pool,
            pages: Vec::new(),
            config,
        };
        site.register_defaults();
        Ok(site)
    }

    fn register_defaults(&mut self) {
        let includes = self.config.build.includes.clone();

        let markdown = Arc::new(MarkdownEngine::new(&includes));
        let tera = Arc::new(TeraEngine::new(&includes, Some(self.paths.src_root())));
        self.engine(&[".md"], markdown);
        self.engine(&[".html", ".tera"], tera);

        let paths = self.paths.clone();
        self.filter(
            "url",
            Arc::new(move |value: &Value, args: &HashMap<String, Value>| -> Result<Value> {
                let target = value.as_str().context("the `url` filter expects a string")?;
                let absolute = args.get("absolute").is_some_and(is_truthy);
                Ok(Value::String(paths.url(target, absolute)))
            }),
        );

        if self.config.build.minify {
            self.process(&[".html"], MinifyType::Html.processor());
            self.process(&[".xml"], MinifyType::Xml.processor());
        }

        let events = self.config.events.clone();
        for (kind, names) in [
            (EventKind::BeforeBuild, &events.before_build),
            (EventKind::AfterBuild, &events.after_build),
            (EventKind::BeforeUpdate, &events.before_update),
            (EventKind::AfterUpdate, &events.after_update),
        ] {
            for name in names {
                self.on_script(kind, name);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Use `engine` for `exts`, replacing previous registrations.
    pub fn engine(&mut self, exts: &[&str], engine: Arc<dyn Engine>) -> &mut Self {
        self.engines.register(exts, engine);
        self
    }

    /// Apply `engine` after the engines already registered for `exts`.
    pub fn append_engine(&mut self, exts: &[&str], engine: Arc<dyn Engine>) -> &mut Self {
        self.engines.append(exts, engine);
        self
    }

    pub fn filter(&mut self, name: &str, filter: Filter) -> &mut Self {
        self.engines.add_filter(name, filter);
        self
    }

    /// Site-wide data, available to every page and layout.
    pub fn data(&mut self, key: &str, value: Value) -> &mut Self {
        self.extra.insert(key.to_owned(), value);
        self
    }

    pub fn process(&mut self, exts: &[&str], processor: Processor) -> &mut Self {
        self.processors.add(exts, processor);
        self
    }

    pub fn load_data(&mut self, exts: &[&str], loader: Loader) -> &mut Self {
        self.source.set_loader(exts, loader);
        self
    }

    /// Copy `from` (file or directory, relative to `src`) verbatim to `to`.
    pub fn copy(&mut self, from: &str, to: Option<&str>) -> &mut Self {
        self.source.copy(CopyRule::new(from, to.map(str::to_owned)));
        self
    }

    pub fn ignore(&mut self, path: &str) -> &mut Self {
        self.source.ignore(path);
        self
    }

    pub fn on(&mut self, kind: EventKind, listener: impl Listener + 'static) -> &mut Self {
        self.events.on(kind, listener);
        self
    }

    /// Run the script `name` on `kind`; its failure vetoes.
    pub fn on_script(&mut self, kind: EventKind, name: &str) -> &mut Self {
        let listener = ScriptListener::new(name, Arc::clone(&self.scripts));
        self.events.on(kind, listener);
        self
    }

    pub fn script(&mut self, name: &str, steps: Vec<String>) -> &mut Self {
        self.scripts.set(name, steps);
        self
    }

    /// Register a page that is not backed by a file, e.g. a generator.
    pub fn add_page(&mut self, page: Page) -> &mut Self {
        self.source.add_page(page);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub const fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub const fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// Pages emitted by the last build or update.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Public URL of a site path, see [`PathResolver::url`].
    pub fn url(&self, path: &str, absolute: bool) -> String {
        self.paths.url(path, absolute)
    }

    /// Run a script (or bare command) in the project root.
    pub fn run(&self, name: &str) -> Result<bool> {
        self.scripts.run(name)
    }

    // ------------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------------

    /// Full build.
    pub fn build(&mut self) -> Result<BuildStatus> {
        if !self.events.dispatch(&Event::new(EventKind::BeforeBuild))? {
            log!("build"; "cancelled by a {} listener", EventKind::BeforeBuild);
            return Ok(BuildStatus::Aborted);
        }

        let dest = self.paths.dest_root().to_path_buf();
        if self.config.build.clean {
            if dest.exists() {
                fs::remove_dir_all(&dest)
                    .with_context(|| format!("failed to clear {}", dest.display()))?;
            }
            self.gate.reset();
        }
        fs::create_dir_all(&dest).with_context(|| format!("failed to create {}", dest.display()))?;

        for rule in self.source.copies().to_vec() {
            self.copy_static(&rule.source(), &rule.target())?;
        }

        self.source.load_directory(&self.engines)?;
        let stats = self.run_tail()?;

        self.events.dispatch(&Event::new(EventKind::AfterBuild))?;
        log!("build"; "done, {} written, {} unchanged", stats.written, stats.unchanged);
        Ok(BuildStatus::Completed(stats))
    }

    /// Incremental rebuild for a set of changed site paths (`/posts/a.md`).
    pub fn update(&mut self, files: &BTreeSet<String>) -> Result<BuildStatus> {
        let before = Event::with_files(EventKind::BeforeUpdate, files.clone());
        if !self.events.dispatch(&before)? {
            log!("update"; "cancelled by a {} listener", EventKind::BeforeUpdate);
            return Ok(BuildStatus::Aborted);
        }

        for file in files {
            let kind = classify(file, |p| self.source.is_static(p));
            log!("update"; "{file} ({})", kind.name());
            match kind {
                ChangeKind::Data | ChangeKind::Content => {
                    self.source.load_file(file, &self.engines)?;
                }
                ChangeKind::Static { from, to } => {
                    let target = path::join(&to, &file[from.len()..]);
                    self.copy_static(file, &target)?;
                }
                ChangeKind::Ignored => {}
            }
        }

        let stats = self.run_tail()?;

        self.events
            .dispatch(&Event::with_files(EventKind::AfterUpdate, files.clone()))?;
        Ok(BuildStatus::Completed(stats))
    }

    /// Copy a file or directory from a site path to a destination path.
    ///
    /// A missing source is logged and skipped.
    pub fn copy_static(&self, from: &str, to: &str) -> Result<()> {
        let source = self.paths.src(from);
        if !source.exists() {
            log!("warn"; "{}", BuildError::MissingSourceFile(source));
            return Ok(());
        }

        let target = self.paths.dest(to);
        if source.is_file() {
            return copy_file(&source, &target);
        }

        for entry in WalkDir::new(&source)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let rel = entry.path().strip_prefix(&source)?;
            copy_file(entry.path(), &target.join(rel))?;
        }
        Ok(())
    }

    fn run_tail(&mut self) -> Result<SaveStats> {
        let pipeline = Pipeline {
            config: &self.config,
            paths: &self.paths,
            engines: &self.engines,
            processors: &self.processors,
            gate: &self.gate,
            pool: &self.pool,
            extra: &self.extra,
        };
        let (pages, stats) = pipeline.run(self.source.pages())?;
        self.pages = pages;
        Ok(stats)
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)
        .with_context(|| format!("failed to copy {} to {}", from.display(), to.display()))?;
    log!("copy"; "{}", to.display());
    Ok(())
}
