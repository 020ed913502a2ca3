//! Periodic repository database synchronization

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::index::provider::IndexHandle;
use crate::index::types::Package;
use crate::service::error::ServiceError;
use crate::service::event::{Event, EventBus, Listener};
use crate::service::registry::{ReconcilableService, ServiceKind};
use crate::service::scheduler::{Reconciler, Scheduler};

/// Syncs the repository databases and tells its listeners when they changed
pub struct SyncService {
    scheduler: Scheduler,
    index: Arc<IndexHandle>,
    bus: EventBus,
}

impl SyncService {
    pub fn new(config: &ServiceConfig, index: Arc<IndexHandle>) -> Self {
        Self {
            scheduler: Scheduler::new(ServiceKind::Sync.as_str(), config.sync_interval),
            index,
            bus: EventBus::new(),
        }
    }

    /// Subscribe a listener to `sync_finished` notifications
    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.bus.add_listener(listener);
    }

    /// Sync every repository while holding the index write lock
    pub async fn sync(&self, force: bool) -> Result<(), ServiceError> {
        let changed = {
            let _guard = self.index.lock_for_write().await;
            self.index.index().sync_all(force).await?
        };

        if changed {
            info!("Repository databases changed, notifying {} listeners", self.bus.listener_count());
            self.bus.publish(Event::SyncFinished);
        } else {
            debug!("Repository databases unchanged");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Reconciler for SyncService {
    async fn execute(&self) -> Result<(), ServiceError> {
        self.sync(false).await
    }

    async fn react_to(&self, event: Event) -> Result<(), ServiceError> {
        match event {
            Event::ForceSync => self.sync(true).await,
            _ => Ok(()),
        }
    }
}

impl ReconcilableService for SyncService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Sync
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn data(&self) -> Option<Arc<Vec<Package>>> {
        None
    }
}

impl Listener for SyncService {
    fn process_event(&self, event: Event) {
        self.scheduler.send_message(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::error::IndexError;
    use crate::index::provider::MockPackageIndex;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<Event>>,
    }

    impl Listener for RecordingListener {
        fn process_event(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn service_with(index: MockPackageIndex) -> (Arc<SyncService>, Arc<RecordingListener>) {
        let service = Arc::new(SyncService::new(
            &ServiceConfig::default(),
            Arc::new(IndexHandle::new(Arc::new(index))),
        ));
        let listener = Arc::new(RecordingListener::default());
        service.add_listener(listener.clone());
        (service, listener)
    }

    #[tokio::test]
    async fn execute_publishes_when_databases_changed() {
        let mut index = MockPackageIndex::new();
        index
            .expect_sync_all()
            .withf(|force| !*force)
            .times(1)
            .returning(|_| Ok(true));
        let (service, listener) = service_with(index);

        service.execute().await.unwrap();

        assert_eq!(*listener.events.lock().unwrap(), vec![Event::SyncFinished]);
    }

    #[tokio::test]
    async fn execute_stays_quiet_when_nothing_changed() {
        let mut index = MockPackageIndex::new();
        index.expect_sync_all().times(1).returning(|_| Ok(false));
        let (service, listener) = service_with(index);

        service.execute().await.unwrap();

        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn execute_surfaces_provider_failure_without_publishing() {
        let mut index = MockPackageIndex::new();
        index.expect_sync_all().times(1).returning(|_| {
            Err(IndexError::Command {
                command: "fakeroot pacman -Sy".to_string(),
                stderr: "error: failed to synchronize all databases".to_string(),
            })
        });
        let (service, listener) = service_with(index);

        let result = service.execute().await;

        assert!(matches!(result, Err(ServiceError::Index(IndexError::Command { .. }))));
        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn force_sync_message_forces_refresh() {
        let mut index = MockPackageIndex::new();
        index
            .expect_sync_all()
            .withf(|force| *force)
            .times(1)
            .returning(|_| Ok(true));
        let (service, listener) = service_with(index);

        service.react_to(Event::ForceSync).await.unwrap();

        assert_eq!(*listener.events.lock().unwrap(), vec![Event::SyncFinished]);
    }

    #[tokio::test]
    async fn other_messages_are_ignored() {
        let mut index = MockPackageIndex::new();
        index.expect_sync_all().times(0);
        let (service, _listener) = service_with(index);

        service.react_to(Event::SyncFinished).await.unwrap();
        service
            .react_to(Event::FsEvent {
                path: PathBuf::from("/var/lib/pacman/db.lck"),
                kind: crate::service::event::FsEventKind::Remove,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sync_waits_for_index_write_lock() {
        let mut index = MockPackageIndex::new();
        index.expect_sync_all().times(1).returning(|_| Ok(false));
        let handle = Arc::new(IndexHandle::new(Arc::new(index)));
        let service = Arc::new(SyncService::new(&ServiceConfig::default(), handle.clone()));

        let guard = handle.lock_for_write().await;
        let task = {
            let service = service.clone();
            tokio::spawn(async move { service.sync(false).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn sync_service_exposes_no_data() {
        let (service, _listener) = service_with(MockPackageIndex::new());
        assert!(service.data().is_none());
        assert_eq!(service.kind(), ServiceKind::Sync);
    }
}
