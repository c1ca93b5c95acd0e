//! Minify processors for HTML and XML output.
//!
//! Registered for `.html` and `.xml` when `build.minify` is on.

use crate::{
    config::SiteConfig,
    page::{Content, Page},
    pipeline::Processor,
};
use anyhow::Result;
use std::sync::Arc;

/// Content type for minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyType {
    Html,
    Xml,
}

impl MinifyType {
    pub fn minify(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Html => minify_html_inner(bytes),
            Self::Xml => minify_xml_inner(bytes),
        }
    }

    /// A processor minifying the page content in place.
    pub fn processor(self) -> Processor {
        Arc::new(move |page: &mut Page, _: &SiteConfig| -> Result<()> {
            if let Some(bytes) = page.content.as_bytes() {
                let minified = self.minify(bytes);
                page.content = Content::from_bytes(minified);
            }
            Ok(())
        })
    }
}

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}

/// Minify XML by dropping indentation and blank lines.
fn minify_xml_inner(xml: &[u8]) -> Vec<u8> {
    String::from_utf8_lossy(xml)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<String>()
        .into_bytes()
}
