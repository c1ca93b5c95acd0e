//! Save stage: content-addressed, atomic writes.
//!
//! Every written page leaves its content digest in the [`SaveGate`], keyed
//! by destination file. A later pass producing the same bytes for the same
//! destination skips the write, so an unchanged rebuild touches nothing.

use crate::{config::PathResolver, error::BuildError, log, page::Page};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;

/// Destination file → digest of the bytes last written there.
#[derive(Debug, Default)]
pub struct SaveGate {
    written: Mutex<FxHashMap<String, String>>,
}

impl SaveGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every digest; the next save of each page writes.
    pub fn reset(&self) {
        self.written.lock().clear();
    }

    /// Write `page.content` to its destination unless nothing changed.
    ///
    /// Returns whether a file was written. Empty content is never saved.
    pub fn save(&self, page: &mut Page, paths: &PathResolver) -> Result<bool> {
        if page.content.is_empty() {
            return Ok(false);
        }
        let Some(bytes) = page.content.as_bytes() else {
            return Err(BuildError::UnexpandedPage(page.src.to_string()).into());
        };

        let file = page.dest.file();
        let target = paths.dest(&file);
        let digest = digest(bytes);

        let unchanged = self.written.lock().get(&file) == Some(&digest) && target.is_file();
        if !unchanged {
            write_atomic(&target, bytes)
                .with_context(|| format!("failed to save {} to {}", page.src, target.display()))?;
            log!("save"; "{file} {}", page.src);
            self.written.lock().insert(file, digest.clone());
        }

        page.dest.hash = Some(digest);
        Ok(!unchanged)
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Write through a temp file in the target directory, then rename over.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .with_context(|| format!("{} has no parent directory", target.display()))?;
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}
