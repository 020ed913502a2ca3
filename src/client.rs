//! Client side of the line protocol, used by `pkgupd query`

use std::io;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::config::{ListenAddr, QueryOptions};
use crate::server::protocol::{Request, Response};
use crate::service::registry::ServiceKind;

/// Printed in numeric mode for services that answered with an error
const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("Connection error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Server closed the connection")]
    Closed,
}

trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientStream for T {}

pub struct Client {
    framed: Framed<Box<dyn ClientStream>, LinesCodec>,
}

impl Client {
    pub async fn connect(addr: &ListenAddr) -> Result<Self, ClientError> {
        let stream: Box<dyn ClientStream> = match addr {
            ListenAddr::Tcp(_) => {
                let target = connect_addr(addr);
                let stream = TcpStream::connect(&target)
                    .await
                    .map_err(|source| ClientError::Connect {
                        addr: target.clone(),
                        source,
                    })?;
                Box::new(stream)
            }
            ListenAddr::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|source| ClientError::Connect {
                        addr: path.display().to_string(),
                        source,
                    })?;
                Box::new(stream)
            }
        };

        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new()),
        })
    }

    /// Send one request and wait for its response line
    pub async fn request(&mut self, request_type: &str) -> Result<Response, ClientError> {
        let line = serde_json::to_string(&Request::new(request_type))?;
        self.framed.send(line).await?;

        let reply = self.framed.next().await.ok_or(ClientError::Closed)??;
        debug!("Response for {}: {}", request_type, reply);
        Ok(serde_json::from_str(&reply)?)
    }
}

/// Connect target for a listen address; a bare `:port` means this host
fn connect_addr(addr: &ListenAddr) -> String {
    match addr {
        ListenAddr::Tcp(addr) if addr.starts_with(':') => format!("127.0.0.1{}", addr),
        ListenAddr::Tcp(addr) => addr.clone(),
        ListenAddr::Unix(path) => path.display().to_string(),
    }
}

/// Run the `query` subcommand and return what should be printed
pub async fn run_query(options: &QueryOptions) -> Result<String, ClientError> {
    let mut client = Client::connect(&options.listen_addr()).await?;

    if options.force_sync
        && let Response::Error(message) = client.request(ServiceKind::Sync.as_str()).await?
    {
        warn!("Could not force a sync: {}", message);
    }

    let mut responses = Vec::with_capacity(options.services.len());
    for service in &options.services {
        responses.push((service.as_str(), client.request(service).await?));
    }

    Ok(render(&responses, options))
}

fn render(responses: &[(&str, Response)], options: &QueryOptions) -> String {
    if options.numeric {
        return responses
            .iter()
            .map(|(_, response)| match response {
                Response::Ok(packages) => packages.len().to_string(),
                Response::Error(_) => NOT_AVAILABLE.to_string(),
            })
            .collect::<Vec<_>>()
            .join(&options.separator);
    }

    let width = responses
        .iter()
        .map(|(service, _)| service.len())
        .max()
        .unwrap_or_default();
    let mut lines = Vec::new();
    for (service, response) in responses {
        match response {
            Response::Ok(packages) if packages.is_empty() && options.verbose => {
                lines.push(format!("No updates for service {}", service));
            }
            Response::Ok(packages) => {
                for package in packages {
                    if options.verbose {
                        lines.push(format!(
                            "[{:<width$}] {} {} -> {}",
                            service.to_uppercase(),
                            package.name,
                            package.local_version,
                            package.remote_version,
                            width = width
                        ));
                    } else {
                        lines.push(package.name.clone());
                    }
                }
            }
            Response::Error(message) => {
                warn!("Server returned error for service {}: {}", service, message);
            }
        }
    }
    lines.join("\n")
}
