//! Remote metadata trait for looking up versions of foreign packages

use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::remote::error::MetadataError;

/// Trait for fetching the latest published versions from a remote package index
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RemoteMetadata: Send + Sync {
    /// Fetches the latest version of every named package
    ///
    /// # Arguments
    /// * `package_names` - Names of the packages to look up
    ///
    /// # Returns
    /// * `Ok(HashMap)` - Package name to version; unknown packages are absent
    /// * `Err(MetadataError)` - If the request or the response is bad
    async fn fetch_versions(
        &self,
        package_names: &[String],
    ) -> Result<HashMap<String, String>, MetadataError>;
}
