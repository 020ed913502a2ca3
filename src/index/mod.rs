//! Package index layer
//!
//! # Modules
//!
//! - [`provider`]: `PackageIndex` trait and the shared handle carrying the write lock
//! - [`pacman`]: `PackageIndex` implementation driving the `pacman` command
//! - [`conf`]: Typed pacman.conf parsing
//! - [`sandbox`]: Check and repair of the sandbox database root
//! - [`types`]: The `Package` record
//! - [`error`]: Error types for index, configuration and sandbox operations

pub mod conf;
pub mod error;
pub mod pacman;
pub mod provider;
pub mod sandbox;
pub mod types;

pub use provider::{IndexHandle, PackageIndex};
pub use types::Package;
