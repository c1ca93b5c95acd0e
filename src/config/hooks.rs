//! `[events]` section configuration.
//!
//! Binds pipeline events to script names from `[scripts]`.

use serde::{Deserialize, Serialize};

/// `[events]` section in `_config.toml`.
///
/// # Example
/// ```toml
/// [scripts]
/// lint = ["npm run lint"]
///
/// [events]
/// before_build = ["lint"]   # a failing script cancels the build
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    pub before_build: Vec<String>,
    pub after_build: Vec<String>,
    pub before_update: Vec<String>,
    pub after_update: Vec<String>,
}
