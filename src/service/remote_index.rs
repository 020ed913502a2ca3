//! Updates for foreign packages, resolved against remote metadata

use std::sync::Arc;

use tracing::info;

use crate::config::{DB_LOCK_FILE, ServiceConfig};
use crate::index::provider::IndexHandle;
use crate::index::types::{NO_REMOTE_VERSION, Package};
use crate::remote::metadata::RemoteMetadata;
use crate::service::cache::ResultCache;
use crate::service::debounce::DebounceGate;
use crate::service::error::ServiceError;
use crate::service::event::{Event, Listener};
use crate::service::registry::{ReconcilableService, ServiceKind};
use crate::service::scheduler::{Reconciler, Scheduler};

/// Looks up foreign packages remotely and keeps the ones with newer versions
pub struct RemoteIndexService {
    scheduler: Scheduler,
    index: Arc<IndexHandle>,
    metadata: Arc<dyn RemoteMetadata>,
    cache: ResultCache,
    debounce: DebounceGate,
}

impl RemoteIndexService {
    pub fn new(
        config: &ServiceConfig,
        index: Arc<IndexHandle>,
        metadata: Arc<dyn RemoteMetadata>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(ServiceKind::Aur.as_str(), config.aur_interval),
            index,
            metadata,
            cache: ResultCache::new(),
            debounce: DebounceGate::new(DB_LOCK_FILE),
        }
    }

    /// Resolve remote versions and replace the cached result.
    ///
    /// When the metadata lookup fails the cache is left as it was.
    pub async fn scan(&self) -> Result<(), ServiceError> {
        let foreign = self.index.index().foreign_packages().await?;
        let names: Vec<String> = foreign.iter().map(|package| package.name.clone()).collect();
        let versions = self.metadata.fetch_versions(&names).await?;

        let updates: Vec<Package> = foreign
            .into_iter()
            .map(|mut package| {
                package.remote_version = versions
                    .get(&package.name)
                    .cloned()
                    .unwrap_or_else(|| NO_REMOTE_VERSION.to_string());
                package
            })
            .filter(|package| package.has_remote() && package.is_updatable())
            .collect();

        info!(
            "Found {} remote updates among {} foreign packages",
            updates.len(),
            names.len()
        );
        self.cache.replace(updates);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reconciler for RemoteIndexService {
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

impl ReconcilableService for RemoteIndexService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Aur
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn data(&self) -> Option<Arc<Vec<Package>>> {
        Some(self.cache.snapshot())
    }
}

impl Listener for RemoteIndexService {
    fn process_event(&self, event: Event) {
        self.scheduler.send_message(event);
    }
}
