//! Snapshot holder for scan results

use std::sync::{Arc, Mutex, PoisonError};

use crate::index::types::Package;

/// The latest scan result of a service.
///
/// The whole list is swapped on every update, so readers always see one
/// complete scan.
#[derive(Debug, Default)]
pub struct ResultCache {
    packages: Mutex<Arc<Vec<Package>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<Package>> {
        self.packages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, packages: Vec<Package>) {
        *self.packages.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(packages);
    }
}
