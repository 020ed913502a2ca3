//! pacman.conf parsing into a typed configuration

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::index::error::ConfigError;

/// Section holding the global options
const OPTIONS_SECTION: &str = "options";

/// Matches `[name]` and captures `name`
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.*)\]$").expect("valid section regex"));

/// Matches `Key = value` or a bare `Key`
static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s*(?:=\s*(.*))?$").expect("valid directive regex"));

/// A repository section of pacman.conf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    /// `Server` directives in file order
    pub servers: Vec<String>,
    /// `Include` directives in file order
    pub includes: Vec<PathBuf>,
}

/// The subset of pacman.conf the daemon cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacmanConfig {
    /// `IgnorePkg`: package names never reported as updatable
    pub ignore_pkg: Vec<String>,
    /// `IgnoreGroup`: groups whose members are never reported as updatable
    pub ignore_group: Vec<String>,
    /// `Architecture`, unless set to `auto`
    pub architecture: Option<String>,
    /// `DBPath`: the system package database
    pub db_path: Option<PathBuf>,
    /// Repository sections in file order
    pub repositories: Vec<Repository>,
}

impl PacmanConfig {
    /// Read and parse a pacman.conf file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse pacman.conf content.
    ///
    /// Lines that are neither a section header nor a directive are skipped.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        let mut section = OPTIONS_SECTION.to_string();

        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(caps) = SECTION_RE.captures(line) {
                section = caps[1].trim().to_string();
                if section != OPTIONS_SECTION && config.repository_mut(&section).is_none() {
                    config.repositories.push(Repository {
                        name: section.clone(),
                        ..Default::default()
                    });
                }
                continue;
            }

            let Some(caps) = DIRECTIVE_RE.captures(line) else {
                debug!("Skipping unrecognized pacman.conf line: {}", line);
                continue;
            };
            let key = &caps[1];
            let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

            if section == OPTIONS_SECTION {
                config.apply_option(key, value);
            } else if let Some(repo) = config.repository_mut(&section) {
                match key {
                    "Server" => repo.servers.push(value.to_string()),
                    "Include" => repo.includes.push(PathBuf::from(value)),
                    _ => {}
                }
            }
        }

        config
    }

    /// Names of all repository sections
    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.repositories.iter().map(|repo| repo.name.as_str())
    }

    fn apply_option(&mut self, key: &str, value: &str) {
        match key {
            "IgnorePkg" => self.ignore_pkg.extend(split_list(value)),
            "IgnoreGroup" => self.ignore_group.extend(split_list(value)),
            "Architecture" => {
                self.architecture = (value != "auto" && !value.is_empty()).then(|| value.to_string())
            }
            "DBPath" => self.db_path = Some(PathBuf::from(value)),
            _ => {}
        }
    }

    fn repository_mut(&mut self, name: &str) -> Option<&mut Repository> {
        self.repositories.iter_mut().find(|repo| repo.name == name)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split_whitespace().map(str::to_string)
}
