//! Site initialization module.
//!
//! Creates a new site with a default `_config.toml`, a base layout and two
//! sample pages.

use crate::config::SiteConfig;
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore", ".ignore"];

/// Starter files, relative to the source root
const STARTER_FILES: &[(&str, &str)] = &[
    (
        "_includes/base.html",
        "<!doctype html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n  <title>{{ title }}</title>\n</head>\n<body>\n{{ content }}\n</body>\n</html>\n",
    ),
    (
        "index.md",
        "---\ntitle: Home\nlayout: base.html\n---\n# Welcome\n\nEdit `index.md` to get started.\n",
    ),
    (
        "404.md",
        "---\ntitle: Not found\nlayout: base.html\npermalink: /404.html\n---\n# Page not found\n",
    ),
];

/// Create a new site under the configured root.
///
/// Without a name the root is the current directory, which must be empty.
pub fn new_site(config: &SiteConfig, has_name: bool) -> Result<()> {
    let root = config.get_root();

    // Safety check: if no name was provided (init in current dir),
    // the directory must be completely empty
    if !has_name && !is_dir_empty(root)? {
        bail!("Current directory is not empty. Use `ember init <SITE_NAME>` to create in a subdirectory.");
    }

    init_starter_files(&config.src_dir())?;
    init_default_config(root)?;
    init_ignored_files(root, &[config.build.dest.as_path()])?;
    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Write default configuration file
fn init_default_config(root: &Path) -> Result<()> {
    let path = root.join(crate::config::defaults::config_file());
    if path.exists() {
        bail!("Config file `{}` already exists.", path.display());
    }
    let content = toml::to_string_pretty(&SiteConfig::default())?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the layout and sample pages
fn init_starter_files(src: &Path) -> Result<()> {
    for (rel, content) in STARTER_FILES {
        let path = src.join(rel);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `ember init <SITE_NAME>` instead.",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

/// Initialize .gitignore and .ignore files with specified paths
pub fn init_ignored_files(root: &Path, paths: &[&Path]) -> Result<()> {
    let content = paths
        .iter()
        .filter_map(|p| p.to_str())
        .collect::<Vec<_>>()
        .join("\n");

    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)?;
        }
    }

    Ok(())
}
