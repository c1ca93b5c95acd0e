//! Markdown engine (`pulldown-cmark`).

use super::{Engine, Filter, frontmatter};
use crate::page::Data;
use anyhow::Result;
use pulldown_cmark::{Options, Parser, html};
use std::path::{Path, PathBuf};

pub struct MarkdownEngine {
    includes: PathBuf,
    options: Options,
}

impl MarkdownEngine {
    pub fn new(includes: impl Into<PathBuf>) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            includes: includes.into(),
            options,
        }
    }
}

impl Engine for MarkdownEngine {
    fn load(&self, path: &Path) -> Result<Data> {
        frontmatter::load_file(path)
    }

    fn render(&self, content: &str, _data: &Data, _path: &Path) -> Result<String> {
        let parser = Parser::new_ext(content, self.options);
        let mut out = String::with_capacity(content.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }

    // Markdown has no expression syntax, filters are meaningless here
    fn add_filter(&self, _name: &str, _filter: Filter) {}

    fn includes(&self) -> &Path {
        &self.includes
    }
}
