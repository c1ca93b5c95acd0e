//! YAML front matter.
//!
//! ```text
//! ---
//! title: Hello
//! layout: post.html
//! ---
//! Body text…
//! ```
//!
//! The block must start at the very first byte and is closed by a line that
//! holds only `---`. The body (minus the single line break after the closing
//! `---`) is stored under `content`.

use crate::page::{Data, keys};
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::{fs, path::Path};

const DELIMITER: &str = "---";

/// Split `source` into front matter data and body.
pub fn parse(source: &str) -> Result<Data> {
    if let Some((yaml, body)) = split(source) {
        let mut data = parse_yaml_map(yaml)?;
        data.insert(keys::CONTENT.into(), Value::String(body.to_owned()));
        return Ok(data);
    }

    let mut data = Data::new();
    data.insert(keys::CONTENT.into(), Value::String(source.to_owned()));
    Ok(data)
}

/// Read a file and parse its front matter.
pub fn load_file(path: &Path) -> Result<Data> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&source).with_context(|| format!("invalid front matter in {}", path.display()))
}

/// Parse a YAML document that must be a mapping (empty is an empty map).
pub fn parse_yaml_map(yaml: &str) -> Result<Data> {
    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return Ok(Data::new());
    }

    match serde_yaml::from_str::<Value>(trimmed)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Data::new()),
        other => bail!("front matter must be a mapping, found {}", kind(&other)),
    }
}

fn split(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix(DELIMITER)?;
    // `----` is a horizontal rule, not a delimiter
    if rest.starts_with('-') {
        return None;
    }

    let mut from = 0;
    while let Some(pos) = rest[from..].find("\n---") {
        let end = from + pos;
        let after = &rest[end + 1 + DELIMITER.len()..];
        let after = after.strip_prefix('\r').unwrap_or(after);
        if after.is_empty() || after.starts_with('\n') {
            let body = after.strip_prefix('\n').unwrap_or(after);
            return Some((&rest[..end], body));
        }
        from = end + 1;
    }
    None
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
