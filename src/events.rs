//! Pipeline events.
//!
//! ```text
//! build():   BeforeBuild  ─▶ clean, copy, load, tail ─▶ AfterBuild
//! update():  BeforeUpdate ─▶ classify, reload, tail  ─▶ AfterUpdate
//! ```
//!
//! Listeners run in registration order. The first one returning
//! [`Flow::Veto`] stops the dispatch; for the `Before*` events the pass is
//! then skipped without an error.

use crate::scripts::Scripts;
use anyhow::Result;
use std::{collections::BTreeSet, fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    BeforeBuild,
    AfterBuild,
    BeforeUpdate,
    AfterUpdate,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeBuild => "beforeBuild",
            Self::AfterBuild => "afterBuild",
            Self::BeforeUpdate => "beforeUpdate",
            Self::AfterUpdate => "afterUpdate",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dispatched event. `files` is set for the update events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub files: Option<BTreeSet<String>>,
}

impl Event {
    pub const fn new(kind: EventKind) -> Self {
        Self { kind, files: None }
    }

    pub const fn with_files(kind: EventKind, files: BTreeSet<String>) -> Self {
        Self {
            kind,
            files: Some(files),
        }
    }
}

/// Outcome of one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Veto,
}

impl From<bool> for Flow {
    fn from(ok: bool) -> Self {
        if ok { Self::Continue } else { Self::Veto }
    }
}

pub trait Listener: Send + Sync {
    fn handle(&self, event: &Event) -> Result<Flow>;
}

impl<F> Listener for F
where
    F: Fn(&Event) -> Result<Flow> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<Flow> {
        self(event)
    }
}

/// Runs a named script; an unsuccessful run vetoes.
pub struct ScriptListener {
    name: String,
    scripts: Arc<Scripts>,
}

impl ScriptListener {
    pub fn new(name: impl Into<String>, scripts: Arc<Scripts>) -> Self {
        Self {
            name: name.into(),
            scripts,
        }
    }
}

impl Listener for ScriptListener {
    fn handle(&self, _event: &Event) -> Result<Flow> {
        self.scripts.run(&self.name).map(Flow::from)
    }
}

/// Event type → ordered listeners.
#[derive(Default)]
pub struct Events {
    listeners: Vec<(EventKind, Box<dyn Listener>)>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, listener: impl Listener + 'static) {
        self.listeners.push((kind, Box::new(listener)));
    }

    /// Run every listener for `event.kind`; `Ok(false)` means vetoed.
    pub fn dispatch(&self, event: &Event) -> Result<bool> {
        for (_, listener) in self.listeners.iter().filter(|(k, _)| *k == event.kind) {
            if listener.handle(event)? == Flow::Veto {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
