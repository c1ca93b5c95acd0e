//! Shared pipeline tail, run by both full builds and incremental updates.
//!
//! ```text
//! source pages
//!     │ drafts dropped (unless dev), content reset to body
//!     ├── concrete ──▶ resolve_url ─────────────┐
//!     └── generator ─▶ expand (sequential) ─────┤
//!                                               ▼
//!                                  render (sequential, errors collected)
//!                                               ▼
//!                     ┌──── rayon pool (build.concurrency) ────┐
//!                     │  process: processors for dest.ext      │
//!                     │  save:    SaveGate                     │
//!                     └────────────────────────────────────────┘
//! ```
//!
//! A failing page never stops its siblings inside a stage; the stage fails
//! once every page went through, with every message attached.

pub mod expand;
pub mod render;
pub mod save;
pub mod url;

use crate::{
    config::{PathResolver, SiteConfig},
    engine::Engines,
    error::BuildError,
    log,
    page::{Data, Page},
};
use anyhow::{Result, bail};
use rayon::{ThreadPool, prelude::*};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use self::{expand::expand, render::Renderer, save::SaveGate, url::resolve_url};

/// Post-render transform of a page, scoped to its output extension.
pub type Processor = Arc<dyn Fn(&mut Page, &SiteConfig) -> Result<()> + Send + Sync>;

/// Output extension → processors, in registration order.
#[derive(Default)]
pub struct Processors {
    entries: FxHashMap<String, Vec<Processor>>,
}

impl Processors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, exts: &[&str], processor: Processor) {
        for ext in exts {
            let ext = if ext.starts_with('.') {
                (*ext).to_owned()
            } else {
                format!(".{ext}")
            };
            self.entries
                .entry(ext)
                .or_default()
                .push(Arc::clone(&processor));
        }
    }

    pub fn for_ext(&self, ext: &str) -> &[Processor] {
        self.entries.get(ext).map_or(&[], Vec::as_slice)
    }
}

/// Save stage outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub written: usize,
    pub unchanged: usize,
}

/// Everything one pass reads; borrowed from the `Site`.
pub struct Pipeline<'a> {
    pub config: &'a SiteConfig,
    pub paths: &'a PathResolver,
    pub engines: &'a Engines,
    pub processors: &'a Processors,
    pub gate: &'a SaveGate,
    pub pool: &'a ThreadPool,
    /// Site-wide data merged over every page at render time
    pub extra: &'a Data,
}

impl Pipeline<'_> {
    /// Run expand → render → process → save over `sources`.
    ///
    /// Returns the emitted pages (for inspection) and the save counts.
    pub fn run(&self, sources: Vec<Page>) -> Result<(Vec<Page>, SaveStats)> {
        let build = &self.config.build;
        self.engines.refresh()?;

        let mut pages = Vec::with_capacity(sources.len());
        let mut deferred = Vec::new();
        for mut page in sources {
            if page.is_draft() && !build.dev {
                continue;
            }
            page.content = page.body.clone();
            if page.content.is_generator() {
                deferred.push(page);
            } else {
                resolve_url(&mut page, build.pretty_urls);
                pages.push(page);
            }
        }

        for page in deferred {
            pages.extend(expand(page, self.extra, self.engines.filters(), build.pretty_urls)?);
        }

        let mut renderer = Renderer::new(self.engines, self.paths, self.extra);
        let errors: Vec<anyhow::Error> = pages
            .iter_mut()
            .filter_map(|page| renderer.render(page).err())
            .collect();
        report_errors("render", errors)?;

        warn_collisions(&pages);

        let errors: Vec<anyhow::Error> = self.pool.install(|| {
            pages
                .par_iter_mut()
                .filter(|page| !page.content.is_empty())
                .filter_map(|page| self.process(page).err())
                .collect()
        });
        report_errors("process", errors)?;

        let results: Vec<Result<bool>> = self.pool.install(|| {
            pages
                .par_iter_mut()
                .map(|page| self.gate.save(page, self.paths))
                .collect()
        });

        let mut stats = SaveStats::default();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(true) => stats.written += 1,
                Ok(false) => stats.unchanged += 1,
                Err(err) => errors.push(err),
            }
        }
        report_errors("save", errors)?;

        Ok((pages, stats))
    }

    fn process(&self, page: &mut Page) -> Result<()> {
        for processor in self.processors.for_ext(&page.dest.ext) {
            processor(page, self.config)
                .map_err(|err| err.context(format!("failed to process {}", page.dest.file())))?;
        }
        Ok(())
    }
}

/// Fail the stage with every distinct message, if there was any.
fn report_errors(stage: &'static str, errors: Vec<anyhow::Error>) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }

    let mut seen = FxHashSet::default();
    let errors: Vec<String> = errors
        .into_iter()
        .map(|e| format!("{e:#}"))
        .filter(|e| seen.insert(e.clone()))
        .collect();

    bail!(BuildError::PageFailures { stage, errors });
}

/// Last write wins; just say so.
fn warn_collisions(pages: &[Page]) {
    let mut owners: FxHashMap<String, &Page> = FxHashMap::default();
    for page in pages.iter().filter(|p| !p.content.is_empty()) {
        let file = page.dest.file();
        if let Some(previous) = owners.insert(file.clone(), page) {
            log!("warn"; "{file} is produced by both {} and {}", previous.src, page.src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::tests::TagEngine,
        page::{Content, Src},
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        config: SiteConfig,
        paths: PathResolver,
        engines: Engines,
        processors: Processors,
        gate: SaveGate,
        pool: ThreadPool,
        extra: Data,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut config = SiteConfig::default();
            config.root = dir.path().to_path_buf();
            let paths = config.paths().unwrap();

            let mut engines = Engines::new();
            engines.register(&[".md"], TagEngine::new("md"));

            Self {
                dir,
                config,
                paths,
                engines,
                processors: Processors::new(),
                gate: SaveGate::new(),
                pool: rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap(),
                extra: Data::new(),
            }
        }

        fn run(&self, pages: Vec<Page>) -> Result<(Vec<Page>, SaveStats)> {
            Pipeline {
                config: &self.config,
                paths: &self.paths,
                engines: &self.engines,
                processors: &self.processors,
                gate: &self.gate,
                pool: &self.pool,
                extra: &self.extra,
            }
            .run(pages)
        }

        fn read(&self, file: &str) -> String {
            fs::read_to_string(self.paths.dest(file)).unwrap()
        }
    }

    fn page(path: &str, data: serde_json::Value, body: &str) -> Page {
        Page::new(
            Src {
                path: path.into(),
                ext: ".md".into(),
            },
            ".html",
            data.as_object().cloned().unwrap(),
            Content::from(body),
        )
    }

    #[test]
    fn test_pages_are_rendered_and_saved() {
        let f = Fixture::new();
        let (pages, stats) = f
            .run(vec![page("/about", json!({}), "a"), page("/index", json!({}), "i")])
            .unwrap();

        assert_eq!(stats, SaveStats { written: 2, unchanged: 0 });
        assert_eq!(pages.len(), 2);
        assert_eq!(f.read("/about/index.html"), "md(a)");
        assert_eq!(f.read("/index.html"), "md(i)");
    }

    #[test]
    fn test_second_pass_writes_nothing() {
        let f = Fixture::new();
        let sources = || vec![page("/a", json!({}), "a"), page("/b", json!({}), "b")];

        f.run(sources()).unwrap();
        let before = f.read("/a/index.html");
        let (_, stats) = f.run(sources()).unwrap();

        assert_eq!(stats, SaveStats { written: 0, unchanged: 2 });
        assert_eq!(f.read("/a/index.html"), before);
    }

    #[test]
    fn test_drafts_skipped_unless_dev() {
        let mut f = Fixture::new();
        let sources = || vec![page("/draft", json!({"draft": true}), "d")];

        let (pages, _) = f.run(sources()).unwrap();
        assert!(pages.is_empty());

        f.config.build.dev = true;
        let (pages, _) = f.run(sources()).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_processors_run_in_order_for_extension() {
        let mut f = Fixture::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            f.processors.add(
                &[".html"],
                Arc::new(move |page: &mut Page, _: &SiteConfig| -> Result<()> {
                    order.lock().push((page.dest.file(), tag));
                    if let Content::Text(text) = &mut page.content {
                        text.push_str(&format!("+{tag}"));
                    }
                    Ok(())
                }),
            );
        }
        f.processors.add(
            &["css"],
            Arc::new(|_: &mut Page, _: &SiteConfig| -> Result<()> { anyhow::bail!("not for html") }),
        );

        f.run(vec![page("/a", json!({}), "a")]).unwrap();
        assert_eq!(f.read("/a/index.html"), "md(a)+first+second");
        assert_eq!(
            *order.lock(),
            vec![
                ("/a/index.html".to_owned(), "first"),
                ("/a/index.html".to_owned(), "second")
            ]
        );
    }

    #[test]
    fn test_processor_failure_does_not_stop_siblings() {
        let mut f = Fixture::new();
        f.processors.add(
            &[".html"],
            Arc::new(|page: &mut Page, _: &SiteConfig| -> Result<()> {
                if page.src.path == "/bad" {
                    anyhow::bail!("boom");
                }
                page.content = Content::from("ok");
                Ok(())
            }),
        );

        let sources: Vec<Page> = (0..8)
            .map(|i| page(&format!("/p{i}"), json!({}), "x"))
            .chain([page("/bad", json!({}), "x")])
            .collect();
        let err = f.run(sources).unwrap_err();

        match err.downcast_ref::<BuildError>() {
            Some(BuildError::PageFailures { stage, errors }) => {
                assert_eq!(*stage, "process");
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("/bad/index.html"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // nothing is saved once a stage failed
        assert!(!f.paths.dest("/p0/index.html").exists());
    }

    #[test]
    fn test_render_failures_are_collected() {
        let f = Fixture::new();
        let sources = vec![
            page("/a", json!({"templateEngine": "liquid"}), "a"),
            page("/b", json!({"layout": "missing.md"}), "b"),
            page("/c", json!({}), "c"),
        ];
        let err = f.run(sources).unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::PageFailures { stage, errors }) => {
                assert_eq!(*stage, "render");
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_generator_pages_are_expanded() {
        let f = Fixture::new();
        let mut gen_page = page("/list", json!({}), "");
        gen_page.body = Content::Generator(Arc::new(
            |_: &Data, _: &crate::engine::FilterMap| -> Result<expand::Generated> {
                Ok(expand::Generated::pages((1..=2).map(|n| {
                    json!({"permalink": format!("/list/{n}/"), "content": format!("item {n}")})
                        .as_object()
                        .cloned()
                        .unwrap()
                })))
            },
        ));

        let (pages, stats) = f.run(vec![gen_page]).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(stats.written, 2);
        assert_eq!(f.read("/list/2/index.html"), "md(item 2)");
    }

    #[test]
    fn test_many_pages_and_one_collision() {
        let f = Fixture::new();
        let mut sources: Vec<Page> = (0..32)
            .map(|i| page(&format!("/p/{i}"), json!({}), &format!("page {i}")))
            .collect();
        sources.push(page("/x", json!({"permalink": "/same/"}), "one"));
        sources.push(page("/y", json!({"permalink": "/same/"}), "two"));

        let (_, stats) = f.run(sources).unwrap();
        assert_eq!(stats.written, 34);
        for i in 0..32 {
            assert_eq!(f.read(&format!("/p/{i}/index.html")), format!("md(page {i})"));
        }
        let same = f.read("/same/index.html");
        assert!(same == "md(one)" || same == "md(two)");

        let leftovers = fs::read_dir(f.dir.path().join("_site/same")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
