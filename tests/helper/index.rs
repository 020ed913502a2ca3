//! In-memory package index and remote metadata

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use pkgupd::index::error::IndexError;
use pkgupd::index::provider::PackageIndex;
use pkgupd::index::types::Package;
use pkgupd::remote::error::MetadataError;
use pkgupd::remote::metadata::RemoteMetadata;

/// Package index backed by plain vectors
#[derive(Default)]
pub struct FakeIndex {
    updates: Mutex<Vec<Package>>,
    foreign: Mutex<Vec<Package>>,
    groups: HashMap<String, Vec<String>>,
    sync_changes: AtomicBool,
    sync_calls: Mutex<Vec<bool>>,
    update_scans: AtomicUsize,
    foreign_scans: AtomicUsize,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_updates(self, updates: Vec<Package>) -> Self {
        *self.updates.lock().unwrap() = updates;
        self
    }

    pub fn with_foreign(self, foreign: Vec<Package>) -> Self {
        *self.foreign.lock().unwrap() = foreign;
        self
    }

    pub fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        self.groups.insert(
            group.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Make every sync report changed databases
    pub fn with_changing_sync(self) -> Self {
        self.sync_changes.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_updates(&self, updates: Vec<Package>) {
        *self.updates.lock().unwrap() = updates;
    }

    /// The `force` flag of every sync so far
    pub fn sync_calls(&self) -> Vec<bool> {
        self.sync_calls.lock().unwrap().clone()
    }

    pub fn update_scans(&self) -> usize {
        self.update_scans.load(Ordering::SeqCst)
    }

    pub fn foreign_scans(&self) -> usize {
        self.foreign_scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageIndex for FakeIndex {
    async fn local_updates(&self) -> Result<Vec<Package>, IndexError> {
        self.update_scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.updates.lock().unwrap().clone())
    }

    async fn foreign_packages(&self) -> Result<Vec<Package>, IndexError> {
        self.foreign_scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.foreign.lock().unwrap().clone())
    }

    async fn group_members(&self, group: &str) -> Result<Vec<String>, IndexError> {
        Ok(self.groups.get(group).cloned().unwrap_or_default())
    }

    async fn sync_all(&self, force: bool) -> Result<bool, IndexError> {
        self.sync_calls.lock().unwrap().push(force);
        Ok(self.sync_changes.load(Ordering::SeqCst))
    }
}

/// Remote metadata answering from a fixed map, or failing on demand
#[derive(Default)]
pub struct FakeMetadata {
    versions: HashMap<String, String>,
    failing: AtomicBool,
}

impl FakeMetadata {
    pub fn new(versions: &[(&str, &str)]) -> Self {
        Self {
            versions: versions
                .iter()
                .map(|(name, version)| (name.to_string(), version.to_string()))
                .collect(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteMetadata for FakeMetadata {
    async fn fetch_versions(
        &self,
        package_names: &[String],
    ) -> Result<HashMap<String, String>, MetadataError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Server("Service unavailable".to_string()));
        }
        Ok(package_names
            .iter()
            .filter_map(|name| {
                self.versions
                    .get(name)
                    .map(|version| (name.clone(), version.clone()))
            })
            .collect())
    }
}
