//! Sandbox database root check and repair
//!
//! The daemon syncs into its own database root so it never takes the system
//! database lock. The sandbox layout is:
//!
//! ```text
//! <root>/
//! ├── local -> <system db>/local
//! └── sync/
//!     └── <repo>.db
//! ```

use std::path::Path;

use tracing::{info, warn};

use crate::index::error::SandboxError;

/// Default system package database
pub const SYSTEM_DB_PATH: &str = "/var/lib/pacman";

/// Maximum number of check/repair rounds before giving up
const MAX_REPAIR_ITERATIONS: usize = 10;

/// Verify that the sandbox root is usable for the given repositories
pub fn check(root: &Path, repositories: &[String]) -> Result<(), SandboxError> {
    if !root.is_dir() {
        return Err(SandboxError::MissingSandboxDir(root.to_path_buf()));
    }

    let sync_dir = root.join("sync");
    if !sync_dir.is_dir() {
        return Err(SandboxError::MissingSyncDir(sync_dir));
    }

    // is_dir follows symlinks, so a link to a directory passes as well
    let local_dir = root.join("local");
    if !local_dir.is_dir() {
        return Err(SandboxError::MissingLocalDir(local_dir));
    }

    let missing: Vec<String> = repositories
        .iter()
        .filter(|repo| !sync_dir.join(format!("{}.db", repo)).exists())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(SandboxError::MissingDatabases(missing));
    }

    Ok(())
}

/// Check the sandbox and fix whatever is missing.
///
/// Missing directories are created, `local` is symlinked to the system
/// database and missing repository databases are copied from it. Databases
/// that cannot be copied are logged and left for the first sync to fetch.
pub fn ensure(root: &Path, repositories: &[String], system_db: &Path) -> Result<(), SandboxError> {
    for _ in 0..MAX_REPAIR_ITERATIONS {
        match check(root, repositories) {
            Ok(()) => return Ok(()),
            Err(SandboxError::MissingSandboxDir(path) | SandboxError::MissingSyncDir(path)) => {
                info!("Creating {:?}", path);
                std::fs::create_dir_all(&path).map_err(|source| SandboxError::Repair {
                    path: path.clone(),
                    source,
                })?;
            }
            Err(SandboxError::MissingLocalDir(path)) => {
                let target = system_db.join("local");
                info!("Linking {:?} to {:?}", path, target);
                symlink_local(&target, &path)?;
            }
            Err(SandboxError::MissingDatabases(missing)) => {
                info!("Missing dbs: {}", missing.join(", "));
                for repo in missing {
                    let name = format!("{}.db", repo);
                    let source = system_db.join("sync").join(&name);
                    let destination = root.join("sync").join(&name);
                    if let Err(e) = copy_database(&source, &destination) {
                        warn!("Could not copy database {}: {}", repo, e);
                    }
                }
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }

    Err(SandboxError::TooManyIterations)
}

fn symlink_local(target: &Path, link: &Path) -> Result<(), SandboxError> {
    // A dangling symlink would otherwise make symlink() fail with EEXIST
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(link).map_err(|source| SandboxError::Repair {
            path: link.to_path_buf(),
            source,
        })?;
    }
    std::os::unix::fs::symlink(target, link).map_err(|source| SandboxError::Repair {
        path: link.to_path_buf(),
        source,
    })
}

/// Copy a database file and carry over its modification time
fn copy_database(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::copy(source, destination)?;
    let modified = std::fs::metadata(source)?.modified()?;
    std::fs::File::options()
        .write(true)
        .open(destination)?
        .set_modified(modified)
}
