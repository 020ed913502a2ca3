//! Remote package metadata
//!
//! # Modules
//!
//! - [`metadata`]: `RemoteMetadata` trait for fetching remote versions
//! - [`aur`]: AUR RPC implementation
//! - [`error`]: Error types for remote lookups

pub mod aur;
pub mod error;
pub mod metadata;

pub use aur::AurClient;
pub use metadata::RemoteMetadata;
