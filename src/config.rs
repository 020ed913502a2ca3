use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::index::conf::PacmanConfig;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default interval between repository database syncs in seconds (30 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30 * 60;

/// Default interval between AUR version scans in seconds (30 minutes)
pub const DEFAULT_AUR_INTERVAL_SECS: u64 = 30 * 60;

/// Default interval between local update scans in seconds (10 minutes)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10 * 60;

/// Deadline of a single accept poll; bounds how long shutdown takes to notice
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long an oversize request's remaining input is discarded before closing
pub const OVERSIZE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long shutdown waits for a service loop before aborting it
pub const SERVICE_STOP_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Protocol and filesystem constants
// =============================================================================

/// Maximum length of a single request line in bytes
pub const MAX_REQUEST_LENGTH: usize = 16 * 1024;

/// Default TCP listen address; a leading ':' binds every interface
pub const DEFAULT_LISTEN_ADDR: &str = ":7356";

pub const DEFAULT_PACMAN_CONF: &str = "/etc/pacman.conf";

pub const DEFAULT_DB_ROOT: &str = "/tmp/pkgupd-sandbox";

/// Lock file pacman holds while writing its database
pub const DB_LOCK_FILE: &str = "db.lck";

// =============================================================================
// Command line
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "pkgupd")]
#[command(version, about = "Tracks available updates for pacman repositories and the AUR")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub daemon: DaemonOptions,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask a running daemon for pending updates
    Query(QueryOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListenType {
    Tcp,
    Unix,
}

#[derive(Debug, Args)]
pub struct DaemonOptions {
    /// Periodically sync the repository databases
    #[arg(short = 's', long)]
    pub enable_sync: bool,

    /// Track foreign packages in the AUR
    #[arg(short = 'a', long)]
    pub enable_aur: bool,

    /// Seconds between repository database syncs
    #[arg(
        long,
        default_value_t = DEFAULT_SYNC_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sync_interval: u64,

    /// Seconds between AUR scans
    #[arg(
        long,
        default_value_t = DEFAULT_AUR_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub aur_interval: u64,

    /// Seconds between local update scans
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    #[arg(long, default_value = DEFAULT_PACMAN_CONF)]
    pub pacman_conf: PathBuf,

    /// Sandbox database root used for syncing
    #[arg(short = 'd', long, default_value = DEFAULT_DB_ROOT)]
    pub db_root: PathBuf,

    #[arg(short = 'l', long, value_enum, default_value_t = ListenType::Tcp)]
    pub listen_type: ListenType,

    /// `host:port` for tcp, socket path for unix, or a `tcp://`/`unix://` URL
    #[arg(short = 'r', long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,

    /// Rescan when the pacman database changes on disk
    #[arg(short = 'm', long)]
    pub monitor_changes: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = crate::remote::aur::DEFAULT_BASE_URL)]
    pub aur_url: String,
}

impl DaemonOptions {
    pub fn listen_addr(&self) -> ListenAddr {
        ListenAddr::new(self.listen_type, &self.listen_addr)
    }
}

#[derive(Debug, Args)]
pub struct QueryOptions {
    /// Services to query
    #[arg(default_values_t = [String::from("repo"), String::from("aur")])]
    pub services: Vec<String>,

    /// Print only the number of updates per service
    #[arg(short = 'n', long, conflicts_with = "verbose")]
    pub numeric: bool,

    /// Separator between counts in numeric mode
    #[arg(long, default_value = " ")]
    pub separator: String,

    /// Ask the daemon to sync before querying
    #[arg(short = 'f', long)]
    pub force_sync: bool,

    /// Print one line per package
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[arg(short = 'l', long, value_enum, default_value_t = ListenType::Tcp)]
    pub listen_type: ListenType,

    #[arg(short = 'r', long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: String,
}

impl QueryOptions {
    pub fn listen_addr(&self) -> ListenAddr {
        ListenAddr::new(self.listen_type, &self.listen_addr)
    }
}

// =============================================================================
// Runtime configuration
// =============================================================================

/// Where the protocol server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(String),
    Unix(PathBuf),
}

impl ListenAddr {
    /// An explicit `unix://` or `tcp://` prefix on `addr` overrides `listen_type`
    pub fn new(listen_type: ListenType, addr: &str) -> Self {
        if let Some(path) = addr.strip_prefix("unix://") {
            return ListenAddr::Unix(PathBuf::from(path));
        }
        if let Some(addr) = addr.strip_prefix("tcp://") {
            return ListenAddr::Tcp(addr.to_string());
        }
        match listen_type {
            ListenType::Tcp => ListenAddr::Tcp(addr.to_string()),
            ListenType::Unix => ListenAddr::Unix(PathBuf::from(addr)),
        }
    }

    /// Address suitable for binding or connecting; `:port` means every interface
    pub fn socket_addr(&self) -> Option<String> {
        match self {
            ListenAddr::Tcp(addr) if addr.starts_with(':') => Some(format!("0.0.0.0{}", addr)),
            ListenAddr::Tcp(addr) => Some(addr.clone()),
            ListenAddr::Unix(_) => None,
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "tcp://{}", addr),
            ListenAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Read-only settings handed to service constructors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub ignore_packages: Vec<String>,
    pub ignore_groups: Vec<String>,
    pub sync_interval: Duration,
    pub repo_interval: Duration,
    pub aur_interval: Duration,
}

impl ServiceConfig {
    pub fn new(options: &DaemonOptions, pacman: &PacmanConfig) -> Self {
        Self {
            ignore_packages: pacman.ignore_pkg.clone(),
            ignore_groups: pacman.ignore_group.clone(),
            sync_interval: Duration::from_secs(options.sync_interval),
            repo_interval: Duration::from_secs(options.poll_interval),
            aur_interval: Duration::from_secs(options.aur_interval),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ignore_packages: Vec::new(),
            ignore_groups: Vec::new(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            repo_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            aur_interval: Duration::from_secs(DEFAULT_AUR_INTERVAL_SECS),
        }
    }
}
