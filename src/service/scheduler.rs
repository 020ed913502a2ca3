//! Timer- and message-driven execution loop shared by every service

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::service::error::ServiceError;

/// Shortest interval a scheduler ticks at; a zero period is raised to this
const MIN_INTERVAL: Duration = Duration::from_millis(1);
use crate::service::event::Event;

/// The two callbacks a scheduler drives
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    /// Periodic work, also run once when the loop starts
    async fn execute(&self) -> Result<(), ServiceError>;

    /// Handle a message from the mailbox
    async fn react_to(&self, event: Event) -> Result<(), ServiceError>;
}

/// Runs a [`Reconciler`] on a fixed interval and feeds it mailbox messages.
///
/// Only one callback runs at a time. Errors from callbacks are logged and the
/// loop keeps going.
pub struct Scheduler {
    name: &'static str,
    interval: Duration,
    sender: mpsc::UnboundedSender<Event>,
    receiver: Mutex<mpsc::UnboundedReceiver<Event>>,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                "{} service interval {:?} is too short, using {:?}",
                name, interval, MIN_INTERVAL
            );
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name,
            interval: interval.max(MIN_INTERVAL),
            sender,
            receiver: Mutex::new(receiver),
            running: AtomicBool::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the loop until [`Scheduler::stop`] is called.
    ///
    /// Returns immediately if the loop is already running elsewhere.
    pub async fn run<R: Reconciler + ?Sized>(&self, reconciler: &R) {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            warn!("{} service is already running", self.name);
            return;
        };
        self.running.store(true, Ordering::SeqCst);
        info!("Starting {} service", self.name);

        self.execute(reconciler).await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(Event::Quit) | None => break,
                    Some(event) => {
                        debug!("{} service received {}", self.name, event);
                        if let Err(e) = reconciler.react_to(event).await {
                            error!("{} service failed to handle message: {}", self.name, e);
                        }
                    }
                },
                _ = ticker.tick() => self.execute(reconciler).await,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("{} service stopped", self.name);
    }

    async fn execute<R: Reconciler + ?Sized>(&self, reconciler: &R) {
        if let Err(e) = reconciler.execute().await {
            error!("{} service update failed: {}", self.name, e);
        }
    }

    /// Ask a running loop to exit. Does nothing when the loop is idle.
    ///
    /// Returns without waiting for the loop to finish.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("Stopping {} service", self.name);
            let _ = self.sender.send(Event::Quit);
        }
    }

    /// Queue a message for the loop. The reserved quit message is rejected.
    pub fn send_message(&self, event: Event) {
        if event == Event::Quit {
            warn!("Refusing to deliver reserved quit message to {} service", self.name);
            return;
        }
        if self.sender.send(event).is_err() {
            warn!("{} service mailbox is closed", self.name);
        }
    }
}
