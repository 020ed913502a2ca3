//! Service capability trait and the name-keyed registry the server reads from

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::index::types::Package;
use crate::service::event::Event;
use crate::service::scheduler::{Reconciler, Scheduler};

/// The services the daemon knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Sync,
    Repo,
    Aur,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Sync, ServiceKind::Repo, ServiceKind::Aur];

    /// Name used on the wire and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Sync => "sync",
            ServiceKind::Repo => "repo",
            ServiceKind::Aur => "aur",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(ServiceKind::Sync),
            "repo" => Ok(ServiceKind::Repo),
            "aur" => Ok(ServiceKind::Aur),
            _ => Err(()),
        }
    }
}

/// A long-running reconciliation job driven by its own [`Scheduler`].
///
/// Implementors provide the scheduler and the [`Reconciler`] callbacks; the
/// lifecycle methods delegate to the scheduler.
#[async_trait::async_trait]
pub trait ReconcilableService: Reconciler {
    fn kind(&self) -> ServiceKind;

    fn scheduler(&self) -> &Scheduler;

    /// Latest scan result, or `None` for services that do not keep one
    fn data(&self) -> Option<Arc<Vec<Package>>>;

    /// Run the service loop until [`ReconcilableService::stop`] is called
    async fn start(&self) {
        self.scheduler().run(self).await;
    }

    fn stop(&self) {
        self.scheduler().stop();
    }

    fn send_message(&self, event: Event) {
        self.scheduler().send_message(event);
    }
}

/// Registered services, looked up by kind or wire name
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceKind, Arc<dyn ReconcilableService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn ReconcilableService>) {
        let kind = service.kind();
        if self.services.insert(kind, service).is_some() {
            warn!("Replacing already registered {} service", kind);
        }
    }

    pub fn get(&self, kind: ServiceKind) -> Option<Arc<dyn ReconcilableService>> {
        self.services.get(&kind).cloned()
    }

    /// Look up a service by its wire name
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ReconcilableService>> {
        name.parse().ok().and_then(|kind| self.get(kind))
    }

    /// Spawn one task per registered service
    pub fn start_all(&self) -> RunningServices {
        let tasks = ServiceKind::ALL
            .iter()
            .filter_map(|kind| self.services.get(kind))
            .map(|service| {
                info!(
                    "Scheduling {} service every {:?}",
                    service.kind(),
                    service.scheduler().interval()
                );
                let task_service = service.clone();
                let handle = tokio::spawn(async move { task_service.start().await });
                (service.clone(), handle)
            })
            .collect();
        RunningServices { tasks }
    }
}

/// Handles of spawned service loops
pub struct RunningServices {
    tasks: Vec<(Arc<dyn ReconcilableService>, JoinHandle<()>)>,
}

impl RunningServices {
    /// Stop every service and wait for its loop to exit.
    ///
    /// A loop that has not exited after `grace` is aborted.
    pub async fn stop(self, grace: Duration) {
        for (service, _) in &self.tasks {
            service.stop();
        }

        for (service, mut handle) in self.tasks {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => info!("{} service finished", service.kind()),
                Ok(Err(e)) => error!("{} service task failed: {}", service.kind(), e),
                Err(_) => {
                    warn!("{} service did not stop in time, aborting", service.kind());
                    handle.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::error::ServiceError;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubService {
        kind: ServiceKind,
        scheduler: Scheduler,
        executions: AtomicUsize,
    }

    impl StubService {
        fn new(kind: ServiceKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                scheduler: Scheduler::new(kind.as_str(), Duration::from_secs(3600)),
                executions: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Reconciler for StubService {
        async fn execute(&self) -> Result<(), ServiceError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn react_to(&self, _event: Event) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    impl ReconcilableService for StubService {
        fn kind(&self) -> ServiceKind {
            self.kind
        }

        fn scheduler(&self) -> &Scheduler {
            &self.scheduler
        }

        fn data(&self) -> Option<Arc<Vec<Package>>> {
            None
        }
    }

    #[rstest]
    #[case("sync", Some(ServiceKind::Sync))]
    #[case("repo", Some(ServiceKind::Repo))]
    #[case("aur", Some(ServiceKind::Aur))]
    #[case("AUR", None)]
    #[case("", None)]
    fn service_kind_from_wire_name(#[case] name: &str, #[case] expected: Option<ServiceKind>) {
        assert_eq!(name.parse::<ServiceKind>().ok(), expected);
    }

    #[test]
    fn lookup_finds_only_registered_services() {
        let mut registry = ServiceRegistry::new();
        registry.register(StubService::new(ServiceKind::Repo));

        assert!(registry.get(ServiceKind::Repo).is_some());
        assert_eq!(
            registry.lookup("repo").map(|service| service.kind()),
            Some(ServiceKind::Repo)
        );
        assert!(registry.lookup("aur").is_none());
        assert!(registry.lookup("bogus").is_none());
    }

    #[tokio::test]
    async fn start_all_runs_every_service_and_stop_joins_them() {
        let repo = StubService::new(ServiceKind::Repo);
        let aur = StubService::new(ServiceKind::Aur);
        let mut registry = ServiceRegistry::new();
        registry.register(repo.clone());
        registry.register(aur.clone());

        let running = registry.start_all();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !(repo.scheduler.is_running() && aur.scheduler.is_running()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        running.stop(Duration::from_secs(5)).await;

        assert!(!repo.scheduler.is_running());
        assert!(!aur.scheduler.is_running());
        assert_eq!(repo.executions.load(Ordering::SeqCst), 1);
        assert_eq!(aur.executions.load(Ordering::SeqCst), 1);
    }
}
