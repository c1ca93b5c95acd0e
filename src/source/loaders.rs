//! Data file loaders, by extension.
//!
//! | Extension       | Parser        |
//! |-----------------|---------------|
//! | `.yml` `.yaml`  | `serde_yaml`  |
//! | `.json`         | `serde_json`  |
//! | `.toml`         | `toml`        |

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{fs, path::Path, sync::Arc};

/// Parses one data file into a value.
pub type Loader = Arc<dyn Fn(&Path) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub struct Loaders {
    by_ext: FxHashMap<String, Loader>,
}

impl Default for Loaders {
    fn default() -> Self {
        let mut loaders = Self {
            by_ext: FxHashMap::default(),
        };
        loaders.set(&[".yml", ".yaml"], Arc::new(yaml));
        loaders.set(&[".json"], Arc::new(json));
        loaders.set(&[".toml"], Arc::new(toml));
        loaders
    }
}

impl Loaders {
    pub fn set(&mut self, exts: &[&str], loader: Loader) {
        for ext in exts {
            let ext = if ext.starts_with('.') {
                (*ext).to_owned()
            } else {
                format!(".{ext}")
            };
            self.by_ext.insert(ext, Arc::clone(&loader));
        }
    }

    pub fn get(&self, ext: &str) -> Option<&Loader> {
        self.by_ext.get(ext)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn yaml(path: &Path) -> Result<Value> {
    let source = read(path)?;
    if source.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&source).with_context(|| format!("invalid YAML in {}", path.display()))
}

fn json(path: &Path) -> Result<Value> {
    serde_json::from_str(&read(path)?).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn toml(path: &Path) -> Result<Value> {
    let table: toml::Table =
        toml::from_str(&read(path)?).with_context(|| format!("invalid TOML in {}", path.display()))?;
    Ok(serde_json::to_value(table)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn load(name: &str, source: &str) -> Result<Value> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, source).unwrap();
        let ext = crate::utils::path::extname(name);
        let loaders = Loaders::default();
        loaders.get(ext).unwrap()(&path)
    }

    #[test]
    fn test_default_formats() {
        assert_eq!(load("a.yml", "name: x\nn: 2").unwrap(), json!({"name": "x", "n": 2}));
        assert_eq!(load("a.yaml", "- 1\n- 2").unwrap(), json!([1, 2]));
        assert_eq!(load("a.json", r#"{"k": [true]}"#).unwrap(), json!({"k": [true]}));
        assert_eq!(
            load("a.toml", "title = \"T\"\n[author]\nname = \"A\"").unwrap(),
            json!({"title": "T", "author": {"name": "A"}})
        );
    }

    #[test]
    fn test_empty_yaml_is_null() {
        assert_eq!(load("a.yml", "\n").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_file_errors() {
        assert!(load("a.json", "{").is_err());
        assert!(load("a.toml", "= 1").is_err());
    }

    #[test]
    fn test_custom_loader() {
        let mut loaders = Loaders::default();
        loaders.set(&["csv"], Arc::new(|_: &Path| -> Result<Value> { Ok(json!("csv")) }));
        assert!(loaders.get(".csv").is_some());
        assert!(loaders.get(".txt").is_none());
    }
}
