//! Reconciliation services and the machinery that drives them
//!
//! Every service owns a [`Scheduler`] that runs its work on a fixed interval
//! and feeds it mailbox messages. Services talk to each other only through
//! [`Event`]s delivered to [`Listener`]s.
//!
//! # Modules
//!
//! - [`event`]: `Event` messages, the `Listener` trait and `EventBus` fan-out
//! - [`scheduler`]: Interval/mailbox loop and the `Reconciler` callbacks
//! - [`registry`]: `ReconcilableService` trait, `ServiceKind` and `ServiceRegistry`
//! - [`sync`]: Repository database sync
//! - [`repo`]: Repository update scan
//! - [`remote_index`]: Foreign package update scan against remote metadata
//! - [`cache`]: Atomically replaced scan results
//! - [`debounce`]: Lock-file aware change debounce
//! - [`error`]: Service error type

pub mod cache;
pub mod debounce;
pub mod error;
pub mod event;
pub mod registry;
pub mod remote_index;
pub mod repo;
pub mod scheduler;
pub mod sync;

pub use error::ServiceError;
pub use event::{Event, EventBus, FsEventKind, Listener};
pub use registry::{ReconcilableService, RunningServices, ServiceKind, ServiceRegistry};
pub use remote_index::RemoteIndexService;
pub use repo::RepoService;
pub use scheduler::{Reconciler, Scheduler};
pub use sync::SyncService;
