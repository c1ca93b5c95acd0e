//! Slash-separated site path helpers.
//!
//! Site paths (`/posts/hello`, `/img/a.png`) are always `/`-separated,
//! independent of the host platform, so they get their own helpers instead
//! of `std::path`.

/// Join `base` and `path` and normalize the result.
///
/// `.` and `..` segments are resolved, repeated slashes collapsed, and a
/// trailing slash on the joined string is kept.
///
/// ```text
/// join("/blog/", "about")      → /blog/about
/// join("/about", "index")      → /about/index
/// join("/blog/", "../x/")      → /x/
/// join("posts", "a")           → posts/a
/// ```
pub fn join(base: &str, path: &str) -> String {
    let joined = match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_owned(),
        (_, true) => base.to_owned(),
        _ => format!("{base}/{path}"),
    };
    normalize(&joined)
}

/// Normalize a slash-separated path.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".into();
    }

    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut out = segments.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    if out.is_empty() {
        out.push('.');
    }
    out
}

/// Final segment, ignoring a trailing slash.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Extension of the final segment including the dot, or `""`.
///
/// A leading dot is not an extension: `extname("/.htaccess") == ""`.
pub fn extname(path: &str) -> &str {
    let base = basename(path);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(i) => &base[i..],
    }
}

/// Make a path absolute by prefixing `/` when needed.
pub fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}
