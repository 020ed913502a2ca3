//! Filesystem change watcher for the package database

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::service::event::{Event, EventBus, FsEventKind, Listener};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher is already running")]
    AlreadyRunning,
}

struct ActiveWatch {
    watcher: RecommendedWatcher,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Publishes create and remove events under a fixed set of directories as
/// `fs_event` messages
pub struct FsWatcher {
    bus: Arc<EventBus>,
    active: Option<ActiveWatch>,
}

impl FsWatcher {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
            active: None,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.bus.add_listener(listener);
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Watch the given directories (non-recursively) and start publishing
    pub fn start(&mut self, dirs: &[PathBuf]) -> Result<(), WatcherError> {
        if self.active.is_some() {
            return Err(WatcherError::AlreadyRunning);
        }

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for event in translate(event) {
                        let _ = sender.send(event);
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            },
            Config::default(),
        )?;
        for dir in dirs {
            info!("Watching {:?}", dir);
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let bus = self.bus.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = receiver.recv() => match event {
                        Some(event) => bus.publish(event),
                        None => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            debug!("Watch loop exited");
        });

        self.active = Some(ActiveWatch {
            watcher,
            shutdown,
            task,
        });
        Ok(())
    }

    /// Remove every watch and wait for the publishing loop to exit
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        drop(active.watcher);
        active.shutdown.cancel();
        if let Err(e) = active.task.await {
            error!("Watch loop failed: {}", e);
        }
        info!("Filesystem watcher stopped");
    }
}

impl Default for FsWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a notify event into one `fs_event` per affected path.
///
/// Only creations and removals are kept.
fn translate(event: notify::Event) -> Vec<Event> {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Create,
        EventKind::Remove(_) => FsEventKind::Remove,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| Event::FsEvent { path, kind })
        .collect()
}
