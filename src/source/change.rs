//! Classification of changed site paths for incremental updates.
//!
//! | Kind      | Matches                                   | Update action            |
//! |-----------|-------------------------------------------|--------------------------|
//! | `Data`    | `…/_data/…`, `…/_data.<ext>`              | reload that data file    |
//! | `Ignored` | any other `_`- or `.`-prefixed segment    | nothing                  |
//! | `Static`  | under a static mapping's source           | copy that one file       |
//! | `Content` | everything else                           | reload that content file |

use regex::Regex;
use std::sync::OnceLock;

/// What an update should do with one changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Data,
    Ignored,
    /// Matching mapping, as `(from, to)` site paths
    Static { from: String, to: String },
    Content,
}

impl ChangeKind {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Ignored => "ignored",
            Self::Static { .. } => "static",
            Self::Content => "content",
        }
    }
}

fn data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/_data/|/_data\.\w+$").expect("valid regex"))
}

/// Is `path` a data source (`_data.<ext>` or under a `_data` directory)?
pub fn is_data_path(path: &str) -> bool {
    data_re().is_match(path)
}

/// Is any segment of `path` `_`- or `.`-prefixed?
pub fn is_reserved_path(path: &str) -> bool {
    path.contains("/_") || path.contains("/.")
}

/// Classify a site path (`/posts/a.md`). `find_static` returns the static
/// mapping containing a path, if any.
pub fn classify<F>(path: &str, find_static: F) -> ChangeKind
where
    F: Fn(&str) -> Option<(String, String)>,
{
    if is_data_path(path) {
        ChangeKind::Data
    } else if is_reserved_path(path) {
        ChangeKind::Ignored
    } else if let Some((from, to)) = find_static(path) {
        ChangeKind::Static { from, to }
    } else {
        ChangeKind::Content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statics(path: &str) -> Option<(String, String)> {
        path.starts_with("/img/")
            .then(|| ("/img".to_owned(), "/assets".to_owned()))
    }

    #[test]
    fn test_data_paths() {
        assert_eq!(classify("/_data.yml", statics), ChangeKind::Data);
        assert_eq!(classify("/blog/_data.json", statics), ChangeKind::Data);
        assert_eq!(classify("/_data/authors.toml", statics), ChangeKind::Data);
        assert_eq!(classify("/blog/_data/nav/main.yml", statics), ChangeKind::Data);
    }

    #[test]
    fn test_reserved_paths_are_ignored() {
        assert_eq!(classify("/_includes/base.html", statics), ChangeKind::Ignored);
        assert_eq!(classify("/.git/HEAD", statics), ChangeKind::Ignored);
        assert_eq!(classify("/posts/.draft.md", statics), ChangeKind::Ignored);
        assert_eq!(classify("/_data.yml.swp/x", statics), ChangeKind::Ignored);
    }

    #[test]
    fn test_static_paths() {
        assert_eq!(
            classify("/img/logo.png", statics),
            ChangeKind::Static {
                from: "/img".into(),
                to: "/assets".into()
            }
        );
    }

    #[test]
    fn test_content_paths() {
        assert_eq!(classify("/posts/hello.md", statics), ChangeKind::Content);
        assert_eq!(classify("/index.html", statics), ChangeKind::Content);
        assert_eq!(ChangeKind::Content.name(), "content");
    }
}
