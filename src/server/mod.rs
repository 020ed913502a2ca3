//! Protocol server
//!
//! Serves the cached results of the registered services over newline-delimited
//! JSON on TCP or a Unix domain socket.
//!
//! # Modules
//!
//! - [`protocol`]: Request/response types and request routing
//! - [`transport`]: Listener binding and accepted connections

pub mod protocol;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    ACCEPT_POLL_INTERVAL, ListenAddr, MAX_REQUEST_LENGTH, OVERSIZE_DRAIN_TIMEOUT,
};
use crate::service::registry::ServiceRegistry;

pub use protocol::{ProtocolError, Request, Response};
pub use transport::{Connection, ServerError, Transport};

const REQUEST_DELIMITER: u8 = b'\n';

/// A bound protocol server
pub struct Server {
    transport: Transport,
    addr: ListenAddr,
    registry: Arc<ServiceRegistry>,
    poll_interval: Duration,
}

impl Server {
    pub async fn bind(addr: ListenAddr, registry: Arc<ServiceRegistry>) -> Result<Self, ServerError> {
        let transport = Transport::bind(&addr).await?;
        Ok(Self {
            transport,
            addr,
            registry,
            poll_interval: ACCEPT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Each accept waits at most one poll interval, so cancellation is noticed
    /// even when no client connects.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Listening on {}", self.addr);

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = tokio::time::timeout(self.poll_interval, self.transport.accept()) => accepted,
            };

            match accepted {
                Err(_) => continue,
                Ok(Ok(connection)) => {
                    let registry = self.registry.clone();
                    match connection {
                        Connection::Tcp(stream) => {
                            tokio::spawn(handle_connection(stream, registry));
                        }
                        Connection::Unix(stream) => {
                            tokio::spawn(handle_connection(stream, registry));
                        }
                    }
                }
                Ok(Err(e)) => warn!("Failed to accept connection: {}", e),
            }
        }

        info!("Server on {} shut down", self.addr);
    }
}

/// Bind and serve until cancelled. Bind failures are returned to the caller.
pub async fn serve(
    addr: ListenAddr,
    registry: Arc<ServiceRegistry>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    Server::bind(addr, registry).await?.run(shutdown).await;
    Ok(())
}

/// Answer newline-terminated requests until the peer hangs up.
///
/// A line longer than [`MAX_REQUEST_LENGTH`] gets an error response and ends
/// the connection. A line that is not UTF-8 gets an error response and the
/// connection stays open.
pub async fn handle_connection<S>(stream: S, registry: Arc<ServiceRegistry>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let codec = AnyDelimiterCodec::new_with_max_length(
        vec![REQUEST_DELIMITER],
        vec![REQUEST_DELIMITER],
        MAX_REQUEST_LENGTH,
    );
    let mut lines = FramedRead::new(reader, codec);
    let mut oversize = false;

    while let Some(chunk) = lines.next().await {
        let response = match chunk {
            Ok(chunk) => match std::str::from_utf8(&chunk) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => protocol::respond(&registry, line),
                Err(e) => Response::from(ProtocolError::from(e)),
            },
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                oversize = true;
                Response::from(ProtocolError::TooLong(MAX_REQUEST_LENGTH))
            }
            Err(AnyDelimiterCodecError::Io(e)) => {
                debug!("Connection read failed: {}", e);
                break;
            }
        };

        if let Err(e) = write_response(&mut writer, &response).await {
            debug!("Connection write failed: {}", e);
            break;
        }
        if oversize {
            break;
        }
    }

    if oversize {
        close_after_oversize(lines.into_inner(), &mut writer).await;
    }
    debug!("Connection closed");
}

/// Shut down the write side, then discard what the peer is still sending.
///
/// Unread input at close turns the FIN into a reset on the peer's side.
async fn close_after_oversize<R, W>(mut reader: R, writer: &mut W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = writer.shutdown().await {
        debug!("Connection shutdown failed: {}", e);
        return;
    }

    let drained = tokio::time::timeout(
        OVERSIZE_DRAIN_TIMEOUT,
        tokio::io::copy(&mut reader, &mut tokio::io::sink()),
    )
    .await;
    match drained {
        Ok(Ok(bytes)) => debug!("Discarded {} bytes after oversize request", bytes),
        Ok(Err(e)) => debug!("Connection drain failed: {}", e),
        Err(_) => debug!("Peer kept sending after oversize request"),
    }
}

async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await
}
