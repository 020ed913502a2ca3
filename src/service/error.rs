use thiserror::Error;

use crate::index::error::IndexError;
use crate::remote::error::MetadataError;

/// Failure of a single reconciliation pass
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Package index error: {0}")]
    Index(#[from] IndexError),

    #[error("Remote metadata error: {0}")]
    Metadata(#[from] MetadataError),
}
