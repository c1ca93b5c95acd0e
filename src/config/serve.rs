//! `[serve]` section configuration.
//!
//! Contains preview server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in `_config.toml` - preview server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"   # Listen on all interfaces
/// port = 8000
/// page404 = "/404.html"   # Served with status 404 for unknown paths
/// watch = true            # Rebuild on file changes
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 3000).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Destination-relative path of the not-found page.
    #[serde(default = "defaults::serve::page404")]
    #[educe(Default = defaults::serve::page404())]
    pub page404: String,

    /// Watch the source tree and rebuild incrementally.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}
