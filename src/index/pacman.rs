//! Package index provider backed by the `pacman` command

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::SystemTime;

use tokio::process::Command;
use tracing::{debug, info};

use crate::index::error::IndexError;
use crate::index::provider::PackageIndex;
use crate::index::types::Package;

const PACMAN: &str = "pacman";
const FAKEROOT: &str = "fakeroot";

/// Snapshot of the sync databases used to detect whether a sync changed anything
type SyncState = BTreeMap<PathBuf, (Option<SystemTime>, u64)>;

/// Runs `pacman` against a sandbox database root so the system database is
/// never written
pub struct PacmanCli {
    db_root: PathBuf,
    config: PathBuf,
}

impl PacmanCli {
    pub fn new(db_root: &Path, config: &Path) -> Self {
        Self {
            db_root: db_root.to_path_buf(),
            config: config.to_path_buf(),
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "--dbpath".to_string(),
            self.db_root.display().to_string(),
            "--config".to_string(),
            self.config.display().to_string(),
        ]
    }

    /// Run a pacman query and return its stdout.
    ///
    /// pacman exits non-zero without any output when a query has no results,
    /// which is reported as empty output rather than an error.
    async fn query(&self, args: &[&str]) -> Result<String, IndexError> {
        let mut command = Command::new(PACMAN);
        command.args(args).args(self.base_args());
        let output = command.output().await?;
        query_output(&format!("{} {}", PACMAN, args.join(" ")), output)
    }

    fn sync_state(&self) -> Result<SyncState, IndexError> {
        let sync_dir = self.db_root.join("sync");
        let mut state = SyncState::new();
        if !sync_dir.is_dir() {
            return Ok(state);
        }
        for entry in std::fs::read_dir(&sync_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "db") {
                let metadata = std::fs::metadata(&path)?;
                state.insert(path, (metadata.modified().ok(), metadata.len()));
            }
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl PackageIndex for PacmanCli {
    async fn local_updates(&self) -> Result<Vec<Package>, IndexError> {
        let stdout = self.query(&["-Qu"]).await?;
        parse_updates(&stdout)
    }

    async fn foreign_packages(&self) -> Result<Vec<Package>, IndexError> {
        let stdout = self.query(&["-Qm"]).await?;
        parse_foreign(&stdout)
    }

    async fn group_members(&self, group: &str) -> Result<Vec<String>, IndexError> {
        let stdout = self.query(&["-Sgq", group]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn sync_all(&self, force: bool) -> Result<bool, IndexError> {
        let before = self.sync_state()?;

        let refresh = if force { "-Syy" } else { "-Sy" };
        let output = Command::new(FAKEROOT)
            .arg("--")
            .arg(PACMAN)
            .arg(refresh)
            .args(self.base_args())
            .args(["--logfile", "/dev/null"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(IndexError::Command {
                command: format!("{} {} {}", FAKEROOT, PACMAN, refresh),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let after = self.sync_state()?;
        let changed = before != after;
        info!(
            "Synchronized {} databases ({})",
            after.len(),
            if changed { "changed" } else { "up to date" }
        );
        Ok(changed)
    }
}

fn query_output(command: &str, output: Output) -> Result<String, IndexError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() && stdout.trim().is_empty() {
        debug!("`{}` returned no results", command);
        return Ok(String::new());
    }

    Err(IndexError::Command {
        command: command.to_string(),
        stderr,
    })
}

/// Parse `pacman -Qu` output: `name old -> new [ignored]`
pub fn parse_updates(stdout: &str) -> Result<Vec<Package>, IndexError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, local, "->", remote, ..] => Ok(Package::repo(name, local, remote)),
                _ => Err(IndexError::InvalidOutput(line.to_string())),
            }
        })
        .collect()
}

/// Parse `pacman -Qm` output: `name version`
pub fn parse_foreign(stdout: &str) -> Result<Vec<Package>, IndexError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [name, local] => Ok(Package::foreign(name, local)),
                _ => Err(IndexError::InvalidOutput(line.to_string())),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[test]
    fn parse_updates_reads_name_and_both_versions() {
        let stdout = "linux 6.1.1.arch1-1 -> 6.1.2.arch1-1\nvim 9.0-1 -> 9.1-1 [ignored]\n";

        let packages = parse_updates(stdout).unwrap();

        assert_eq!(
            packages,
            vec![
                Package::repo("linux", "6.1.1.arch1-1", "6.1.2.arch1-1"),
                Package::repo("vim", "9.0-1", "9.1-1"),
            ]
        );
    }

    #[test]
    fn parse_updates_rejects_malformed_line() {
        let result = parse_updates("linux 6.1.1\n");
        assert!(matches!(result, Err(IndexError::InvalidOutput(_))));
    }

    #[test]
    fn parse_foreign_marks_packages_foreign_without_remote() {
        let packages = parse_foreign("yay 12.0.5-1\n\nparu 2.0.1-1\n").unwrap();

        assert_eq!(
            packages,
            vec![
                Package::foreign("yay", "12.0.5-1"),
                Package::foreign("paru", "2.0.1-1"),
            ]
        );
        assert!(packages.iter().all(|p| p.foreign && !p.has_remote()));
    }

    #[test]
    fn query_output_treats_silent_failure_as_no_results() {
        let stdout = query_output("pacman -Qu", output(1, "", "")).unwrap();
        assert!(stdout.is_empty());
    }

    #[test]
    fn query_output_reports_failure_with_stderr() {
        let result = query_output(
            "pacman -Qu",
            output(1, "", "error: failed to initialize alpm library"),
        );

        match result {
            Err(IndexError::Command { command, stderr }) => {
                assert_eq!(command, "pacman -Qu");
                assert_eq!(stderr, "error: failed to initialize alpm library");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn sync_state_tracks_only_db_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let sync_dir = temp_dir.path().join("sync");
        std::fs::create_dir(&sync_dir).unwrap();
        std::fs::write(sync_dir.join("core.db"), b"core").unwrap();
        std::fs::write(sync_dir.join("core.db.sig"), b"sig").unwrap();

        let pacman = PacmanCli::new(temp_dir.path(), Path::new("/etc/pacman.conf"));
        let state = pacman.sync_state().unwrap();

        assert_eq!(state.len(), 1);
        assert!(state.contains_key(&sync_dir.join("core.db")));
    }
}
