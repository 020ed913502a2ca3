//! TCP and Unix domain socket listeners

use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tracing::{info, warn};

use crate::config::ListenAddr;

/// Permissions of a freshly bound Unix socket: world read/write
const SOCKET_MODE: u32 = 0o666;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Could not bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("Could not prepare socket {path:?}: {source}")]
    Socket { path: PathBuf, source: io::Error },
}

/// A bound listener
pub enum Transport {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        path: PathBuf,
    },
}

/// An accepted connection
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Transport {
    /// Bind to `addr`. A stale Unix socket file is replaced.
    pub async fn bind(addr: &ListenAddr) -> Result<Self, ServerError> {
        match addr {
            ListenAddr::Tcp(_) => {
                let socket_addr = addr
                    .socket_addr()
                    .ok_or_else(|| ServerError::InvalidAddress(addr.to_string()))?;
                let listener = TcpListener::bind(&socket_addr)
                    .await
                    .map_err(|source| ServerError::Bind {
                        addr: socket_addr.clone(),
                        source,
                    })?;
                Ok(Transport::Tcp(listener))
            }
            ListenAddr::Unix(path) => {
                if path.symlink_metadata().is_ok() {
                    info!("Removing stale socket {:?}", path);
                    tokio::fs::remove_file(path)
                        .await
                        .map_err(|source| ServerError::Socket {
                            path: path.clone(),
                            source,
                        })?;
                }

                let listener = UnixListener::bind(path).map_err(|source| ServerError::Bind {
                    addr: path.display().to_string(),
                    source,
                })?;
                tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
                    .await
                    .map_err(|source| ServerError::Socket {
                        path: path.clone(),
                        source,
                    })?;

                Ok(Transport::Unix {
                    listener,
                    path: path.clone(),
                })
            }
        }
    }

    /// Local address of a TCP listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Transport::Tcp(listener) => listener.local_addr().ok(),
            Transport::Unix { .. } => None,
        }
    }

    pub async fn accept(&self) -> io::Result<Connection> {
        match self {
            Transport::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Connection::Tcp(stream))
            }
            Transport::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                Ok(Connection::Unix(stream))
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Transport::Unix { path, .. } = self
            && let Err(e) = std::fs::remove_file(&*path)
        {
            warn!("Could not remove socket {:?}: {}", path, e);
        }
    }
}
