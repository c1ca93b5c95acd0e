//! `[build]` section configuration.
//!
//! Contains the source/destination roots, URL policy and pipeline tuning.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in `_config.toml` - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// src = "content"          # Source root
/// dest = "public"          # Destination root
/// pretty_urls = true       # /about.html -> /about/index.html
/// location = "https://example.com/blog/"
///
/// [[build.copy]]
/// from = "img"
/// to = "assets/img"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source root, relative to the project root.
    #[serde(default = "defaults::build::src")]
    #[educe(Default = defaults::build::src())]
    pub src: PathBuf,

    /// Destination root, relative to the project root.
    #[serde(default = "defaults::build::dest")]
    #[educe(Default = defaults::build::dest())]
    pub dest: PathBuf,

    /// Development mode: drafts are built.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub dev: bool,

    /// Rewrite `foo.html` to `foo/index.html`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub pretty_urls: bool,

    /// Public base URL of the site. Its path is the site's mount point.
    #[serde(default = "defaults::build::location")]
    #[educe(Default = defaults::build::location())]
    pub location: String,

    /// Empty the destination root before a full build.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub clean: bool,

    /// Worker threads used to process and save pages.
    #[serde(default = "defaults::build::concurrency")]
    #[educe(Default = defaults::build::concurrency())]
    pub concurrency: usize,

    /// Register the HTML/XML minify processors.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Layout directory of the default engines, relative to `src`.
    #[serde(default = "defaults::build::includes")]
    #[educe(Default = defaults::build::includes())]
    pub includes: PathBuf,

    /// Extensions loaded as pages but written through verbatim (e.g. `.css`).
    pub assets: Vec<String>,

    /// Extra source paths to ignore, relative to `src`.
    pub ignore: Vec<String>,

    /// Static mappings copied verbatim from `src` to `dest`.
    pub copy: Vec<CopyRule>,
}

/// `[[build.copy]]` entry: a verbatim `from → to` copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyRule {
    pub from: String,
    /// Defaults to `from`.
    #[serde(default)]
    pub to: Option<String>,
}

impl CopyRule {
    pub fn new(from: impl Into<String>, to: Option<String>) -> Self {
        Self {
            from: from.into(),
            to,
        }
    }

    /// Site-relative source, normalized to `/a/b`.
    pub fn source(&self) -> String {
        normalize_site_path(&self.from)
    }

    /// Destination-relative target, normalized to `/a/b`.
    pub fn target(&self) -> String {
        normalize_site_path(self.to.as_deref().unwrap_or(&self.from))
    }
}

/// `img/`, `./img` and `/img` all become `/img`.
pub fn normalize_site_path(path: &str) -> String {
    let trimmed = path
        .trim_start_matches("./")
        .trim_start_matches('/')
        .trim_end_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.src, PathBuf::from("."));
        assert_eq!(config.build.dest, PathBuf::from("_site"));
        assert!(!config.build.dev);
        assert!(config.build.pretty_urls);
        assert!(config.build.clean);
        assert!(!config.build.minify);
        assert_eq!(config.build.location, "http://localhost");
        assert_eq!(config.build.concurrency, 16);
        assert_eq!(config.build.includes, PathBuf::from("_includes"));
        assert!(config.build.copy.is_empty());
    }

    #[test]
    fn test_build_copy_rules() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build]
            copy = [{ from = "img/", to = "assets" }, { from = "./favicon.ico" }]
        "#,
        )
        .unwrap();

        let rules = &config.build.copy;
        assert_eq!(rules[0].source(), "/img");
        assert_eq!(rules[0].target(), "/assets");
        assert_eq!(rules[1].source(), "/favicon.ico");
        assert_eq!(rules[1].target(), "/favicon.ico");
    }

    #[test]
    fn test_build_unknown_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [build]
            output = "public"
        "#,
        );
        assert!(result.is_err());
    }
}
