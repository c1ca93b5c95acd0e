//! Render chain: page engines, then layouts.
//!
//! ```text
//! body ─▶ engine₁ ─▶ engine₂ ─▶ layout A ─▶ layout B ─▶ page.content
//!                               content=…    content=…
//! ```
//!
//! Layout data is merged under the page data, so the page wins on every key
//! except `content`, which is the output of the previous step. Site extra
//! data is applied last.

use crate::{
    config::PathResolver,
    engine::{Engine, Engines, engine_override},
    error::BuildError,
    page::{Content, Data, Page, keys, merge_data},
};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Renders pages for one pipeline pass; layouts are loaded once per pass.
pub struct Renderer<'a> {
    engines: &'a Engines,
    paths: &'a PathResolver,
    extra: &'a Data,
    layouts: FxHashMap<PathBuf, Data>,
}

impl<'a> Renderer<'a> {
    pub fn new(engines: &'a Engines, paths: &'a PathResolver, extra: &'a Data) -> Self {
        Self {
            engines,
            paths,
            extra,
            layouts: FxHashMap::default(),
        }
    }

    /// Render `page.content` in place.
    pub fn render(&mut self, page: &mut Page) -> Result<()> {
        let text = match &page.content {
            Content::Bytes(_) => return Ok(()),
            Content::Generator(_) => {
                return Err(BuildError::UnexpandedPage(page.src.to_string()).into());
            }
            Content::Text(text) => text.clone(),
        };

        let src_file = page.src.to_string();
        let src_path = self.paths.src(&src_file);
        let mut data = merge_data(&page.data, self.extra);

        let custom = engine_override(&data);
        let engines = self.engines.select(&src_file, custom.as_deref())?;

        let mut content = text;
        for engine in &engines {
            content = engine
                .render(&content, &data, &src_path)
                .with_context(|| format!("failed to render {src_file}"))?;
        }

        let mut layout = layout_name(&data);
        let mut chain: Vec<String> = Vec::new();
        while let Some(name) = layout {
            if chain.contains(&name) {
                chain.push(name);
                return Err(BuildError::LayoutCycle(chain).into());
            }

            let engine = self.layout_engine(&name)?;
            let path = self.paths.src_root().join(engine.includes()).join(&name);
            let layout_data = self.load_layout(engine.as_ref(), &path)?;

            let mut merged = layout_data.clone();
            merged.extend(data);
            merged.insert(keys::CONTENT.into(), Value::String(content));
            merged.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

            let body = layout_data
                .get(keys::CONTENT)
                .and_then(Value::as_str)
                .unwrap_or_default();
            content = engine
                .render(body, &merged, &path)
                .with_context(|| format!("failed to render layout {name} for {src_file}"))?;

            data = merged;
            layout = layout_name(&layout_data);
            chain.push(name);
        }

        page.content = Content::Text(content);
        Ok(())
    }

    fn layout_engine(&self, name: &str) -> Result<Arc<dyn Engine>> {
        let engine = self
            .engines
            .for_path(name)
            .and_then(|engines| engines.first())
            .ok_or_else(|| BuildError::NoEngine(name.to_owned()))?;
        Ok(Arc::clone(engine))
    }

    fn load_layout(&mut self, engine: &dyn Engine, path: &Path) -> Result<Data> {
        if let Some(data) = self.layouts.get(path) {
            return Ok(data.clone());
        }
        let data = engine
            .load(path)
            .with_context(|| format!("failed to load layout {}", path.display()))?;
        self.layouts.insert(path.to_path_buf(), data.clone());
        Ok(data)
    }
}

fn layout_name(data: &Data) -> Option<String> {
    data.get(keys::LAYOUT)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TeraEngine, tests::TagEngine};
    use crate::page::Src;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use url::Url;

    fn resolver(dir: &TempDir) -> PathResolver {
        PathResolver::new(
            dir.path().to_path_buf(),
            dir.path().join("_site"),
            Url::parse("http://localhost").unwrap(),
        )
    }

    fn page(path: &str, ext: &str, data: Value, body: &str) -> Page {
        Page::new(
            Src {
                path: path.into(),
                ext: ext.into(),
            },
            ".html",
            data.as_object().cloned().unwrap(),
            Content::from(body),
        )
    }

    fn write_layout(dir: &TempDir, name: &str, source: &str) {
        let path = dir.path().join("_includes").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
    }

    #[test]
    fn test_layout_chain_order() {
        let dir = TempDir::new().unwrap();
        write_layout(&dir, "a.tag", "---\nlayout: b.tag\n---\nA[{content}]");
        write_layout(&dir, "b.tag", "B[{content}]");

        let mut engines = Engines::new();
        engines.register(&[".md"], TagEngine::new("md"));
        engines.register(&[".tag"], TagEngine::new("tag"));
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/post", ".md", json!({"layout": "a.tag"}), "x");
        Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap();

        // TagEngine ignores data, so each step wraps the layout body
        assert_eq!(p.content.as_text(), Some("tag(B[{content}])"));
    }

    #[test]
    fn test_layouts_receive_previous_output() {
        let dir = TempDir::new().unwrap();
        write_layout(&dir, "base.html", "<html>{{ content }}|{{ title }}|{{ site }}</html>");
        write_layout(
            &dir,
            "post.html",
            "---\nlayout: base.html\ntitle: Layout title\nauthor: Ann\n---\n<article>{{ content }} by {{ author }}</article>",
        );

        let mut engines = Engines::new();
        engines.register(&[".html"], Arc::new(TeraEngine::new("_includes", None)));
        engines.register(&[".md"], Arc::new(crate::engine::MarkdownEngine::new("_includes")));
        let paths = resolver(&dir);
        let extra = json!({"site": "Ember"}).as_object().cloned().unwrap();

        let mut p = page("/post", ".md", json!({"layout": "post.html", "title": "Hello"}), "*hi*");
        Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap();

        assert_eq!(
            p.content.as_text(),
            Some("<html><article><p><em>hi</em></p>\n by Ann</article>|Hello|Ember</html>")
        );
    }

    #[test]
    fn test_engine_override_chain() {
        let dir = TempDir::new().unwrap();
        let mut engines = Engines::new();
        engines.register(&[".md"], TagEngine::new("md"));
        engines.register(&[".njk"], TagEngine::new("njk"));
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/a", ".md", json!({"templateEngine": "njk,md"}), "x");
        Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap();
        assert_eq!(p.content.as_text(), Some("md(njk(x))"));
    }

    #[test]
    fn test_invalid_engine_override() {
        let dir = TempDir::new().unwrap();
        let engines = Engines::new();
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/a", ".md", json!({"templateEngine": "liquid"}), "x");
        let err = Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::InvalidEngine(name)) if name == "liquid"
        ));
    }

    #[test]
    fn test_layout_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        write_layout(&dir, "a.tag", "---\nlayout: b.tag\n---\nA");
        write_layout(&dir, "b.tag", "---\nlayout: a.tag\n---\nB");

        let mut engines = Engines::new();
        engines.register(&[".tag"], TagEngine::new("tag"));
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/a", ".md", json!({"layout": "a.tag"}), "x");
        let err = Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::LayoutCycle(chain)) => assert_eq!(chain, &["a.tag", "b.tag", "a.tag"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_layout_without_engine() {
        let dir = TempDir::new().unwrap();
        let engines = Engines::new();
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/a", ".md", json!({"layout": "x.liquid"}), "x");
        let err = Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap_err();
        assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::NoEngine(_))));
    }

    #[test]
    fn test_bytes_pass_through_and_plain_text_without_engine() {
        let dir = TempDir::new().unwrap();
        let engines = Engines::new();
        let paths = resolver(&dir);
        let extra = Data::new();
        let mut renderer = Renderer::new(&engines, &paths, &extra);

        let mut asset = page("/img", ".bin", json!({}), "");
        asset.content = Content::Bytes(vec![0xff, 0x00]);
        renderer.render(&mut asset).unwrap();
        assert!(matches!(&asset.content, Content::Bytes(b) if b == &[0xff, 0x00]));

        let mut css = page("/style", ".css", json!({}), "body{}");
        renderer.render(&mut css).unwrap();
        assert_eq!(css.content.as_text(), Some("body{}"));
    }

    #[test]
    fn test_unexpanded_generator_errors() {
        let dir = TempDir::new().unwrap();
        let engines = Engines::new();
        let paths = resolver(&dir);
        let extra = Data::new();

        let mut p = page("/gen", ".tera", json!({}), "");
        p.content = Content::Generator(Arc::new(
            |_: &Data, _: &crate::engine::FilterMap| -> Result<crate::pipeline::expand::Generated> {
                unreachable!()
            },
        ));
        let err = Renderer::new(&engines, &paths, &extra).render(&mut p).unwrap_err();
        assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::UnexpandedPage(_))));
    }
}
