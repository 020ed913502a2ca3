//! Updates available from the configured repositories

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{DB_LOCK_FILE, ServiceConfig};
use crate::index::provider::{IndexHandle, PackageIndex};
use crate::index::types::Package;
use crate::service::cache::ResultCache;
use crate::service::debounce::DebounceGate;
use crate::service::error::ServiceError;
use crate::service::event::{Event, Listener};
use crate::service::registry::{ReconcilableService, ServiceKind};
use crate::service::scheduler::{Reconciler, Scheduler};

/// Scans installed packages for newer repository versions.
///
/// Packages named in `IgnorePkg` or belonging to an `IgnoreGroup` group are
/// left out of the result.
pub struct RepoService {
    scheduler: Scheduler,
    index: Arc<IndexHandle>,
    ignored_names: HashSet<String>,
    cache: ResultCache,
    debounce: DebounceGate,
}

impl RepoService {
    /// Build the service, expanding ignored groups through the index
    pub async fn new(config: &ServiceConfig, index: Arc<IndexHandle>) -> Self {
        let ignored_names =
            resolve_ignored(index.index(), &config.ignore_packages, &config.ignore_groups).await;
        debug!("Ignoring {} packages", ignored_names.len());

        Self {
            scheduler: Scheduler::new(ServiceKind::Repo.as_str(), config.repo_interval),
            index,
            ignored_names,
            cache: ResultCache::new(),
            debounce: DebounceGate::new(DB_LOCK_FILE),
        }
    }

    pub fn ignored_names(&self) -> &HashSet<String> {
        &self.ignored_names
    }

    /// Query local updates and replace the cached result
    pub async fn scan(&self) -> Result<(), ServiceError> {
        let updates: Vec<Package> = self
            .index
            .index()
            .local_updates()
            .await?
            .into_iter()
            .filter(|package| !self.ignored_names.contains(&package.name))
            .collect();

        info!("Found {} repository updates", updates.len());
        self.cache.replace(updates);
        Ok(())
    }
}

async fn resolve_ignored(
    index: &dyn PackageIndex,
    packages: &[String],
    groups: &[String],
) -> HashSet<String> {
    let mut names: HashSet<String> = packages.iter().cloned().collect();
    for group in groups {
        match index.group_members(group).await {
            Ok(members) => names.extend(members),
            Err(e) => warn!("Could not expand ignored group {}: {}", group, e),
        }
    }
    names
}

#[async_trait::async_trait]
impl Reconciler for RepoService {
    async fn execute(&self) -> Result<(), ServiceError> {
        self.scan().await
    }

    async fn react_to(&self, event: Event) -> Result<(), ServiceError> {
        match event {
            Event::SyncFinished => self.scan().await,
            Event::FsEvent { path, kind } if self.debounce.observe(&path, kind) => self.scan().await,
            _ => Ok(()),
        }
    }
}

impl ReconcilableService for RepoService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Repo
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn data(&self) -> Option<Arc<Vec<Package>>> {
        Some(self.cache.snapshot())
    }
}

impl Listener for RepoService {
    fn process_event(&self, event: Event) {
        self.scheduler.send_message(event);
    }
}
