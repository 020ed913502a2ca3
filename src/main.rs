use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pkgupd::config::{Cli, Command, DaemonOptions, QueryOptions, SERVICE_STOP_TIMEOUT, ServiceConfig};
use pkgupd::index::conf::PacmanConfig;
use pkgupd::index::pacman::PacmanCli;
use pkgupd::index::provider::IndexHandle;
use pkgupd::index::sandbox::{self, SYSTEM_DB_PATH};
use pkgupd::remote::AurClient;
use pkgupd::server::{self, ServerError};
use pkgupd::service::{Listener, RemoteIndexService, RepoService, ServiceRegistry, SyncService};
use pkgupd::watcher::FsWatcher;
use pkgupd::{client, logging};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match cli.command {
        Some(Command::Query(options)) => runtime.block_on(query(options)),
        None => runtime.block_on(run_daemon(cli.daemon)),
    }
}

async fn query(options: QueryOptions) -> anyhow::Result<()> {
    let _guard = logging::init(0, None)?;
    let output = client::run_query(&options).await?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

async fn run_daemon(options: DaemonOptions) -> anyhow::Result<()> {
    let _guard = logging::init(options.verbosity, options.log_file.as_deref())?;
    info!("Starting pkgupd {}", env!("CARGO_PKG_VERSION"));

    let pacman = PacmanConfig::load(&options.pacman_conf)?;
    let repositories: Vec<String> = pacman.repository_names().map(str::to_string).collect();
    let system_db = pacman
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(SYSTEM_DB_PATH));
    sandbox::ensure(&options.db_root, &repositories, &system_db)
        .with_context(|| format!("Sandbox {:?} is not usable", options.db_root))?;

    let config = ServiceConfig::new(&options, &pacman);
    let index = Arc::new(IndexHandle::new(Arc::new(PacmanCli::new(
        &options.db_root,
        &options.pacman_conf,
    ))));

    let mut registry = ServiceRegistry::new();
    let repo = Arc::new(RepoService::new(&config, index.clone()).await);
    registry.register(repo.clone());
    let mut listeners: Vec<Arc<dyn Listener>> = vec![repo];

    if options.enable_aur {
        let metadata = Arc::new(AurClient::new(&options.aur_url));
        let aur = Arc::new(RemoteIndexService::new(&config, index.clone(), metadata));
        registry.register(aur.clone());
        listeners.push(aur);
    }

    if options.enable_sync {
        let sync = Arc::new(SyncService::new(&config, index.clone()));
        for listener in &listeners {
            sync.add_listener(listener.clone());
        }
        registry.register(sync);
    }

    let mut watcher = FsWatcher::new();
    if options.monitor_changes {
        for listener in &listeners {
            watcher.add_listener(listener.clone());
        }
        watcher.start(&[system_db.clone(), system_db.join("local")])?;
    }

    let registry = Arc::new(registry);
    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(server::serve(
        options.listen_addr(),
        registry.clone(),
        shutdown.clone(),
    ));
    let services = registry.start_all();

    let finished = wait_for_shutdown(&mut server).await?;

    services.stop(SERVICE_STOP_TIMEOUT).await;
    watcher.stop().await;
    shutdown.cancel();
    let result = match finished {
        Some(result) => result,
        None => server.await,
    };

    match result {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Server failed: {}", e);
            Err(e.into())
        }
        Err(e) => Err(anyhow::anyhow!("Server task failed: {}", e)),
    }
}

type ServerTask = JoinHandle<Result<(), ServerError>>;

/// Wait for SIGINT, SIGTERM or the server task ending on its own.
///
/// Returns the server's result if it ended first.
async fn wait_for_shutdown(
    server: &mut ServerTask,
) -> anyhow::Result<Option<Result<Result<(), ServerError>, JoinError>>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
            Ok(None)
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
            Ok(None)
        }
        result = server => Ok(Some(result)),
    }
}
