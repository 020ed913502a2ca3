//! Events exchanged between services and the listener fan-out

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

/// Separator between the tag and the fields of a flattened event
pub const FIELD_SEPARATOR: &str = ";;";

/// Filesystem change kinds the watcher reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Create,
    Remove,
}

impl FsEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsEventKind::Create => "create",
            FsEventKind::Remove => "remove",
        }
    }
}

/// A message delivered to a service mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Repository databases were synchronized and changed on disk
    SyncFinished,
    /// A watched path was created or removed
    FsEvent { path: PathBuf, kind: FsEventKind },
    /// Synchronize now, even if the databases look current
    ForceSync,
    /// Reserved: stops the receiving service loop
    Quit,
}

impl Event {
    pub fn tag(&self) -> &'static str {
        match self {
            Event::SyncFinished => "sync_finished",
            Event::FsEvent { .. } => "fs_event",
            Event::ForceSync => "force_sync",
            Event::Quit => "quit",
        }
    }
}

/// Flattened form: the tag followed by `;;`-separated fields
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::FsEvent { path, kind } => write!(
                f,
                "{}{sep}{}{sep}{}",
                self.tag(),
                path.display(),
                kind.as_str(),
                sep = FIELD_SEPARATOR
            ),
            _ => f.write_str(self.tag()),
        }
    }
}

/// Receiver side of the event fan-out
///
/// Implementations must return quickly: publishers call this inline.
pub trait Listener: Send + Sync {
    fn process_event(&self, event: Event);
}

/// Delivers every published event to every registered listener
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn publish(&self, event: Event) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        debug!("Publishing {} to {} listeners", event, listeners.len());
        for listener in listeners {
            listener.process_event(event.clone());
        }
    }
}
