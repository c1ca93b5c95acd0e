//! Centralized path resolution for source files, output files and public URLs.
//!
//! # Architecture
//!
//! ```text
//! SiteConfig
//!     │
//!     └── paths() → PathResolver
//!                       │
//!                       ├── src("/posts/a.md")   → /abs/project/posts/a.md
//!                       ├── dest("/a/index.html") → /abs/project/_site/a/index.html
//!                       └── url("/a/", absolute)  → /blog/a/  |  https://host/blog/a/
//! ```
//!
//! Every site path (`/posts/a.md`) is relative to the source root and every
//! output path relative to the destination root; the `location` path is the
//! mount point the site is published under.

use crate::utils::path;
use std::path::{Path, PathBuf};
use url::Url;

/// Resolves site paths against the source/destination roots and `location`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    src: PathBuf,
    dest: PathBuf,
    location: Url,
}

impl PathResolver {
    pub const fn new(src: PathBuf, dest: PathBuf, location: Url) -> Self {
        Self {
            src,
            dest,
            location,
        }
    }

    /// Absolute source root.
    #[inline]
    pub fn src_root(&self) -> &Path {
        &self.src
    }

    /// Absolute destination root.
    #[inline]
    pub fn dest_root(&self) -> &Path {
        &self.dest
    }

    #[inline]
    pub const fn location(&self) -> &Url {
        &self.location
    }

    /// Source file for a site path (`/posts/a.md`).
    pub fn src(&self, site_path: &str) -> PathBuf {
        join_fs(&self.src, site_path)
    }

    /// Output file for a destination path (`/a/index.html`).
    pub fn dest(&self, dest_path: &str) -> PathBuf {
        join_fs(&self.dest, dest_path)
    }

    /// Map an absolute filesystem path under the source root to a site path.
    ///
    /// Returns `None` for paths outside the source root.
    pub fn site_path(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(&self.src).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        Some(path::join("/", &rel))
    }

    /// Public URL of a site path.
    ///
    /// Relative references (`./`, `../`, `#`, `?`) and fully qualified URLs
    /// are returned as-is. Everything else is joined to the `location`
    /// path; `absolute` adds the origin.
    ///
    /// ```text
    /// location = https://example.com/blog/
    /// url("about/", false)  → /blog/about/
    /// url("/a.css", true)   → https://example.com/blog/a.css
    /// url("#top", _)        → #top
    /// ```
    pub fn url(&self, target: &str, absolute: bool) -> String {
        if ["./", "../", "#", "?"].iter().any(|p| target.starts_with(p)) {
            return target.to_owned();
        }

        if let Ok(url) = Url::parse(target) {
            return url.to_string();
        }

        let joined = path::join(self.location.path(), target);
        if absolute {
            format!("{}{joined}", self.location.origin().ascii_serialization())
        } else {
            joined
        }
    }
}

/// Append a `/`-separated site path to a filesystem root.
///
/// The path is normalized as an absolute site path first, so `..` segments
/// never climb above `root`.
fn join_fs(root: &Path, site_path: &str) -> PathBuf {
    path::normalize(&path::ensure_leading_slash(site_path))
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(location: &str) -> PathResolver {
        PathResolver::new(
            PathBuf::from("/project"),
            PathBuf::from("/project/_site"),
            Url::parse(location).unwrap(),
        )
    }

    #[test]
    fn test_src_and_dest() {
        let paths = resolver("http://localhost");
        assert_eq!(paths.src("/posts/a.md"), PathBuf::from("/project/posts/a.md"));
        assert_eq!(
            paths.dest("/about/index.html"),
            PathBuf::from("/project/_site/about/index.html")
        );
    }

    #[test]
    fn test_dot_segments_stay_under_root() {
        let paths = resolver("http://localhost");
        assert_eq!(paths.dest("/../escaped.html"), PathBuf::from("/project/_site/escaped.html"));
        assert_eq!(paths.dest("a/../../../b/c.css"), PathBuf::from("/project/_site/b/c.css"));
        assert_eq!(paths.dest("./img/./a.png"), PathBuf::from("/project/_site/img/a.png"));
        assert_eq!(paths.src("/../../etc/passwd"), PathBuf::from("/project/etc/passwd"));
    }

    #[test]
    fn test_site_path() {
        let paths = resolver("http://localhost");
        assert_eq!(
            paths.site_path(Path::new("/project/img/a.png")).as_deref(),
            Some("/img/a.png")
        );
        assert_eq!(paths.site_path(Path::new("/elsewhere/a.png")), None);
    }

    #[test]
    fn test_url_with_mount_path() {
        let paths = resolver("https://example.com/blog/");
        assert_eq!(paths.url("about/", false), "/blog/about/");
        assert_eq!(paths.url("/a.css", false), "/blog/a.css");
        assert_eq!(paths.url("/a.css", true), "https://example.com/blog/a.css");
    }

    #[test]
    fn test_url_passthrough() {
        let paths = resolver("https://example.com/blog/");
        assert_eq!(paths.url("#top", false), "#top");
        assert_eq!(paths.url("?page=2", true), "?page=2");
        assert_eq!(paths.url("../up", true), "../up");
        assert_eq!(paths.url("https://other.org/x", false), "https://other.org/x");
    }

    #[test]
    fn test_url_root_location() {
        let paths = resolver("http://localhost:3000");
        assert_eq!(paths.url("/", false), "/");
        assert_eq!(paths.url("/docs/", true), "http://localhost:3000/docs/");
    }
}
