//! Utility modules for the site builder.

pub mod minify;
pub mod path;
