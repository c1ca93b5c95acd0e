//! Named build scripts.
//!
//! A script is an ordered list of steps. A step naming another script runs
//! that script; any other step is a shell command run in the project root.
//!
//! ```toml
//! [scripts]
//! css = ["npx tailwindcss -i style.css -o _site/style.css"]
//! deploy = ["css", "rsync -a _site/ host:/srv/www"]
//! ```
//!
//! Running a name that is not registered runs it as a command itself, so
//! `run("git pull")` works without a table entry.

use crate::{error::BuildError, log};
use anyhow::{Context, Result, bail};
use parking_lot::RwLock;
use regex::Regex;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::{Command, Output},
    sync::OnceLock,
};

/// Script table plus the directory commands run in.
#[derive(Debug)]
pub struct Scripts {
    root: PathBuf,
    table: RwLock<BTreeMap<String, Vec<String>>>,
}

impl Scripts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            table: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register (or replace) a script.
    pub fn set(&self, name: impl Into<String>, steps: Vec<String>) {
        self.table.write().insert(name.into(), steps);
    }

    /// Run a script (or bare command).
    ///
    /// Returns `Ok(false)` when a step exits unsuccessfully; the remaining
    /// steps are skipped. Errors are reserved for steps that cannot be
    /// started at all and for scripts that call themselves.
    pub fn run(&self, name: &str) -> Result<bool> {
        self.run_inner(name, &mut Vec::new())
    }

    fn run_inner(&self, name: &str, stack: &mut Vec<String>) -> Result<bool> {
        let steps = self.table.read().get(name).cloned();
        let Some(steps) = steps else {
            return self.exec_step(name);
        };

        if stack.iter().any(|s| s == name) {
            let chain = format!("{} -> {name}", stack.join(" -> "));
            bail!(BuildError::Script(format!("`{name}` calls itself: {chain}")));
        }

        stack.push(name.to_owned());
        log!("run"; "{name}");
        for step in &steps {
            if !self.run_inner(step, stack)? {
                stack.pop();
                return Ok(false);
            }
        }
        stack.pop();
        Ok(true)
    }

    fn exec_step(&self, step: &str) -> Result<bool> {
        log!("run"; "$ {step}");
        let output = shell(&self.root, step)
            .output()
            .with_context(|| format!("Failed to execute `{step}`"))?;

        if !output.status.success() {
            log!("error"; "{}", format_error(step, &output));
            return Ok(false);
        }

        log_lines("run", &String::from_utf8_lossy(&output.stdout));
        log_lines("run", &String::from_utf8_lossy(&output.stderr));
        Ok(true)
    }
}

/// Build a platform shell invocation of `line` in `root`.
fn shell(root: &Path, line: &str) -> Command {
    #[cfg(windows)]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", line]);
        c
    };
    #[cfg(not(windows))]
    let mut command = {
        let mut c = Command::new("sh");
        c.args(["-c", line]);
        c
    };

    if root.is_dir() {
        command.current_dir(root);
    }
    command
}

fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"));
    re.replace_all(s, "")
}

/// Log non-blank output lines under `prefix`.
fn log_lines(prefix: &str, output: &str) {
    let lines: Vec<&str> = output
        .lines()
        .filter(|line| !strip_ansi(line).trim().is_empty())
        .collect();

    if !lines.is_empty() {
        log!(prefix; "{}", lines.join("\n"));
    }
}

/// Format a failed step's status and output.
fn format_error(step: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut msg = format!("`{step}` failed with {}", output.status);
    for stream in [stderr.trim(), stdout.trim()] {
        if !stream.is_empty() {
            msg.push('\n');
            msg.push_str(stream);
        }
    }
    msg
}
