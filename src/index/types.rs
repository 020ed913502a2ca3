//! Common types for package index providers

use serde::{Deserialize, Serialize};

use crate::version::is_updatable;

/// Remote version reported for packages that have no remote counterpart
pub const NO_REMOTE_VERSION: &str = "0";

/// An installed package together with the newest version known remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name (e.g., "linux", "yay")
    #[serde(rename = "Name")]
    pub name: String,
    /// Version currently installed
    #[serde(rename = "LocalVersion")]
    pub local_version: String,
    /// Version available remotely, or [`NO_REMOTE_VERSION`]
    #[serde(rename = "RemoteVersion")]
    pub remote_version: String,
    /// True when no configured repository provides the package
    #[serde(rename = "Foreign")]
    pub foreign: bool,
}

impl Package {
    /// A package found in one of the configured repositories
    pub fn repo(name: &str, local_version: &str, remote_version: &str) -> Self {
        Self {
            name: name.to_string(),
            local_version: local_version.to_string(),
            remote_version: remote_version.to_string(),
            foreign: false,
        }
    }

    /// A foreign package whose remote version is not known yet
    pub fn foreign(name: &str, local_version: &str) -> Self {
        Self {
            name: name.to_string(),
            local_version: local_version.to_string(),
            remote_version: NO_REMOTE_VERSION.to_string(),
            foreign: true,
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote_version != NO_REMOTE_VERSION
    }

    /// Whether the remote version is newer than the installed one
    pub fn is_updatable(&self) -> bool {
        is_updatable(&self.local_version, &self.remote_version)
    }
}
