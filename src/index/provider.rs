//! Package index provider trait and the shared handle services use to reach it

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::index::error::IndexError;
use crate::index::types::Package;

/// Trait for querying installed packages and synchronizing repository databases
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PackageIndex: Send + Sync {
    /// Installed packages with a newer version in a configured repository
    async fn local_updates(&self) -> Result<Vec<Package>, IndexError>;

    /// Installed packages not provided by any configured repository.
    ///
    /// Remote versions are left at the "no remote" sentinel.
    async fn foreign_packages(&self) -> Result<Vec<Package>, IndexError>;

    /// Names of the packages that belong to a group
    async fn group_members(&self, group: &str) -> Result<Vec<String>, IndexError>;

    /// Synchronize every configured repository database
    ///
    /// # Returns
    /// * `Ok(true)` - The on-disk databases changed
    /// * `Ok(false)` - Everything was already up to date
    async fn sync_all(&self, force: bool) -> Result<bool, IndexError>;
}

/// Shared access to a [`PackageIndex`] plus the lock guarding write operations.
///
/// Readers go straight through [`IndexHandle::index`]; anything that writes the
/// databases must hold [`IndexHandle::lock_for_write`] for the duration.
pub struct IndexHandle {
    index: Arc<dyn PackageIndex>,
    write_lock: Mutex<()>,
}

impl IndexHandle {
    pub fn new(index: Arc<dyn PackageIndex>) -> Self {
        Self {
            index,
            write_lock: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &dyn PackageIndex {
        &*self.index
    }

    /// Acquire the index write lock
    pub async fn lock_for_write(&self) -> MutexGuard<'_, ()> {
        debug!("Acquiring index write lock");
        self.write_lock.lock().await
    }
}
