//! File system watcher for live reload.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Event Loop                            │
//! │                                                               │
//! │  ┌──────────┐   ┌─────────────────┐   ┌────────────────────┐  │
//! │  │ notify   │──▶│ Debouncer       │──▶│ rebuild()          │  │
//! │  │ events   │   │ (500ms, reset   │   │  abs → site paths  │  │
//! │  └──────────┘   │  on each event) │   │  site.update(set)  │  │
//! │  ┌──────────┐   └─────────────────┘   └────────────────────┘  │
//! │  │ Shutdown │──▶ drop pending, exit                           │
//! │  └──────────┘                                                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events whose paths all lie in the destination tree are dropped before they
//! reach the debouncer, so the site's own writes never retrigger it.

use crate::{
    config::PathResolver,
    error::BuildError,
    log,
    site::{BuildStatus, Site},
};
use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

/// Quiet window coalescing bursts of events into one update.
pub const DEBOUNCE_MS: u64 = 500;

/// Wait used while nothing is pending.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Messages consumed by the watch loop.
#[derive(Debug)]
pub enum WatchMessage {
    /// Absolute paths reported by the file system.
    Fs(Vec<PathBuf>),
    /// Stop the loop; a pending window is discarded.
    Shutdown,
}

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp") || name.ends_with('~')
}

/// Map changed absolute paths to site paths (`/posts/a.md`).
///
/// Paths inside the destination tree, outside the source root, or left
/// behind by editors are dropped.
pub fn site_paths(paths: &PathResolver, files: &[PathBuf]) -> BTreeSet<String> {
    files
        .iter()
        .filter(|f| !f.starts_with(paths.dest_root()) && !is_temp_file(f))
        .filter_map(|f| paths.site_path(f))
        .collect()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Accumulates changed paths until the window has been quiet long enough.
struct Debouncer {
    window: Duration,
    pending: Vec<PathBuf>,
    deadline: Option<Instant>,
}

impl Debouncer {
    const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Queue paths and push the deadline back.
    fn add(&mut self, paths: Vec<PathBuf>) {
        self.pending.extend(paths);
        self.deadline = Some(Instant::now() + self.window);
    }

    fn ready(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }

    fn cancel(&mut self) {
        self.deadline = None;
        self.pending.clear();
    }

    fn timeout(&self) -> Duration {
        self.deadline
            .map_or(IDLE_WAIT, |d| d.saturating_duration_since(Instant::now()))
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Run one incremental update; a failure is logged and swallowed.
fn rebuild(site: &mut Site, files: &[PathBuf]) {
    let changed = site_paths(site.paths(), files);
    if changed.is_empty() {
        return;
    }

    log!("watch"; "{}", changed.iter().cloned().collect::<Vec<_>>().join(", "));
    match site.update(&changed) {
        Ok(BuildStatus::Completed(stats)) => {
            log!("watch"; "rebuilt, {} written, {} unchanged", stats.written, stats.unchanged);
        }
        Ok(BuildStatus::Aborted) => {}
        Err(err) => log!("error"; "{:#}", anyhow::Error::from(BuildError::RebuildFailure(err))),
    }
}

/// Drive `site` from `rx` until a shutdown message or a closed channel.
pub fn run_loop(site: &mut Site, rx: &Receiver<WatchMessage>, window: Duration) {
    let dest = site.paths().dest_root().to_path_buf();
    let mut debouncer = Debouncer::new(window);

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(WatchMessage::Fs(paths)) => {
                if !paths.is_empty() && !paths.iter().all(|p| p.starts_with(&dest)) {
                    debouncer.add(paths);
                }
            }
            Ok(WatchMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                debouncer.cancel();
                break;
            }
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                rebuild(site, &debouncer.take());
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the source root and feed changes into `site` until shutdown.
///
/// `tx` is handed to the notify watcher; `rx` is its other end.
pub fn watch_for_changes_blocking(
    mut site: Site,
    tx: Sender<WatchMessage>,
    rx: &Receiver<WatchMessage>,
) -> Result<()> {
    let root = site.paths().src_root().to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if !matches!(event.kind, EventKind::Access(_)) => {
                tx.send(WatchMessage::Fs(event.paths)).ok();
            }
            Ok(_) => {}
            Err(e) => log!("watch"; "error: {e}"),
        }
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    log!("watch"; "{}", root.display());
    run_loop(&mut site, rx, Duration::from_millis(DEBOUNCE_MS));
    Ok(())
}
