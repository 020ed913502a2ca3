//! Version comparison for pacman-style package versions
//!
//! # Modules
//!
//! - [`compare`]: Total ordering over `[epoch:]version[-release]` strings

pub mod compare;

pub use compare::{VersionTriple, compare, is_updatable};
