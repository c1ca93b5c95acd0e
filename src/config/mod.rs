//! Site configuration management for `_config.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                        |
//! |-------------|------------------------------------------------|
//! | `[build]`   | Roots, URL policy, static copies, worker pool  |
//! | `[serve]`   | Preview server (port, interface, 404, watch)   |
//! | `[scripts]` | Named shell steps (`ember run <name>`)         |
//! | `[events]`  | Scripts bound to pipeline events               |
//! | `[extra]`   | Site-wide data available to every template     |
//!
//! # Example
//!
//! ```toml
//! [build]
//! dest = "public"
//! location = "https://example.com/"
//! copy = [{ from = "img" }]
//!
//! [serve]
//! port = 8000
//!
//! [scripts]
//! deploy = ["rsync -a public/ host:/srv/www"]
//!
//! [extra]
//! title = "My Site"
//! ```

mod build;
pub mod defaults;
mod error;
mod hooks;
mod paths;
mod serve;

pub use build::{BuildConfig, CopyRule, normalize_site_path};
pub use error::ConfigError;
pub use hooks::EventsConfig;
pub use paths::PathResolver;
pub use serve::ServeConfig;

use crate::{
    cli::{Cli, Commands},
    page::Data,
};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use url::Url;

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `_config.toml`
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root (set after loading)
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Named scripts: name → steps
    #[serde(default)]
    pub scripts: BTreeMap<String, Vec<String>>,

    /// Scripts bound to pipeline events
    #[serde(default)]
    pub events: EventsConfig,

    /// User-defined data merged into every render
    #[serde(default)]
    pub extra: Data,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load `<root>/<config>` (or defaults when absent) and apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Absolute source root.
    pub fn src_dir(&self) -> PathBuf {
        Self::normalize_path(&self.root.join(&self.build.src))
    }

    /// Absolute destination root.
    pub fn dest_dir(&self) -> PathBuf {
        Self::normalize_path(&self.root.join(&self.build.dest))
    }

    /// Parsed `build.location`.
    pub fn location(&self) -> Result<Url> {
        let url = Url::parse(&self.build.location).map_err(|err| {
            ConfigError::Validation(format!("[build.location] is not a valid URL: {err}"))
        })?;
        Ok(url)
    }

    /// Path resolver over the configured roots and location.
    pub fn paths(&self) -> Result<PathResolver> {
        Ok(PathResolver::new(
            self.src_dir(),
            self.dest_dir(),
            self.location()?,
        ))
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = match &cli.command {
            Commands::Init { name: Some(name) } => {
                cli.root.as_deref().unwrap_or(Path::new("./")).join(name)
            }
            _ => cli.root.clone().unwrap_or_else(|| PathBuf::from("./")),
        };

        self.root = Self::normalize_path(&root);
        self.config_path = Self::normalize_path(&self.root.join(&cli.config));

        if let Some(args) = cli.build_args() {
            Self::update_option(&mut self.build.src, args.src.as_ref());
            Self::update_option(&mut self.build.dest, args.dest.as_ref());
            Self::update_option(&mut self.build.location, args.location.as_ref());
            Self::update_option(&mut self.build.dev, args.dev.as_ref());
            Self::update_option(&mut self.build.clean, args.clean.as_ref());
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            build_args,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());

            // Serving locally: links must point at the preview server
            if build_args.location.is_none() {
                self.build.location = format!("http://{}:{}/", self.serve.interface, self.serve.port);
            }
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let location = self.location()?;
        if !matches!(location.scheme(), "http" | "https") {
            bail!(ConfigError::Validation(
                "[build.location] must start with http:// or https://".into()
            ));
        }

        if self.build.concurrency == 0 {
            bail!(ConfigError::Validation(
                "[build.concurrency] must be greater than 0".into()
            ));
        }

        if self.build.clean && self.src_dir().starts_with(self.dest_dir()) {
            bail!(ConfigError::Validation(
                "[build.dest] contains the source root and would be cleared".into()
            ));
        }

        if self.serve.page404.is_empty() {
            bail!(ConfigError::Validation("[serve.page404] must not be empty".into()));
        }

        let hooks = &self.events;
        for name in hooks
            .before_build
            .iter()
            .chain(&hooks.after_build)
            .chain(&hooks.before_update)
            .chain(&hooks.after_update)
        {
            if !self.scripts.contains_key(name) {
                bail!(ConfigError::UnknownScript(name.clone()));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
