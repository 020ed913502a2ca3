use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Unexpected output line: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Sandbox directory {0:?} does not exist")]
    MissingSandboxDir(PathBuf),

    #[error("Sync db directory {0:?} does not exist")]
    MissingSyncDir(PathBuf),

    #[error("Local db directory {0:?} does not exist or is not a directory")]
    MissingLocalDir(PathBuf),

    #[error("Missing dbs: {}", .0.join(", "))]
    MissingDatabases(Vec<String>),

    #[error("Could not repair {path:?}: {source}")]
    Repair {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Too many fsck iterations")]
    TooManyIterations,
}
