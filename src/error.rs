//! Build pipeline error types.
//!
//! Stage functions return `anyhow::Result` and attach context; these typed
//! variants sit underneath so callers can `downcast_ref` when the kind matters
//! (e.g. the watch loop, or tests asserting on `InvalidEngine`).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the build/update pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// `templateEngine` names an engine that is not registered.
    #[error("Invalid template engine: \"{0}\"")]
    InvalidEngine(String),

    /// No engine is registered for a layout or document extension.
    #[error("no template engine registered for `{0}`")]
    NoEngine(String),

    /// A layout chain references a layout it already went through.
    #[error("layout cycle: {}", .0.join(" -> "))]
    LayoutCycle(Vec<String>),

    /// A static copy source does not exist (logged and skipped).
    #[error("static source not found: `{}`", .0.display())]
    MissingSourceFile(PathBuf),

    /// A generator page reached the render stage without being expanded.
    #[error("page `{0}` still holds a generator at render time")]
    UnexpandedPage(String),

    /// One or more pages failed inside a stage; every message is kept.
    #[error("{stage} failed for {} page(s):\n{}", .errors.len(), .errors.join("\n"))]
    PageFailures {
        stage: &'static str,
        errors: Vec<String>,
    },

    /// A script cannot run, e.g. it calls itself.
    #[error("script {0}")]
    Script(String),

    /// An incremental rebuild failed; the watch loop reports it and carries on.
    #[error("rebuild failed")]
    RebuildFailure(#[source] anyhow::Error),
}
