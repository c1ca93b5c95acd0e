//! Ember - a static site builder with pluggable template engines, layout
//! chains and incremental rebuilds.
//!
//! ```ignore
//! let mut site = Site::new(SiteConfig::default())?;
//! site.data("title", json!("My site"))
//!     .copy("img", Some("assets/img"))
//!     .process(&[".html"], my_processor);
//! site.build()?;
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod init;
pub mod logger;
pub mod page;
pub mod pipeline;
pub mod scripts;
pub mod serve;
pub mod site;
pub mod source;
pub mod utils;
pub mod watch;

pub use site::{BuildStatus, Site};
