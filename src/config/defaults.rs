//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn src() -> PathBuf {
        ".".into()
    }

    pub fn dest() -> PathBuf {
        "_site".into()
    }

    pub fn location() -> String {
        "http://localhost".into()
    }

    pub fn concurrency() -> usize {
        16
    }

    pub fn includes() -> PathBuf {
        "_includes".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        3000
    }

    pub fn page404() -> String {
        "/404.html".into()
    }
}

/// Name of the configuration file looked up in the project root.
pub fn config_file() -> std::path::PathBuf {
    "_config.toml".into()
}
