//! Collapse bursts of database writes into one rescan

use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::service::event::FsEventKind;

/// Tracks whether the package databases changed since the last rescan.
///
/// Any event on a file other than the lock file marks the databases dirty.
/// Removal of the lock file means the writer is done: a rescan is due if and
/// only if something changed in between.
#[derive(Debug)]
pub struct DebounceGate {
    lock_file: OsString,
    db_changed: AtomicBool,
}

impl DebounceGate {
    pub fn new(lock_file: &str) -> Self {
        Self {
            lock_file: OsString::from(lock_file),
            db_changed: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    fn is_dirty(&self) -> bool {
        self.db_changed.load(Ordering::SeqCst)
    }

    /// Record a filesystem event and report whether a rescan should run now
    pub fn observe(&self, path: &Path, kind: FsEventKind) -> bool {
        let is_lock_file = path.file_name().is_some_and(|name| name == self.lock_file);
        if !is_lock_file {
            self.db_changed.store(true, Ordering::SeqCst);
            return false;
        }

        if kind != FsEventKind::Remove {
            return false;
        }

        let changed = self.db_changed.swap(false, Ordering::SeqCst);
        if !changed {
            debug!("Lock file {:?} released without database changes", path);
        }
        changed
    }
}
