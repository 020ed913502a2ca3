//! Newline-delimited JSON request/response types

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::index::types::Package;
use crate::service::event::Event;
use crate::service::registry::{ServiceKind, ServiceRegistry};

/// A client request: `{"RequestType": "<service>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "RequestType")]
    pub request_type: String,
}

impl Request {
    pub fn new(request_type: &str) -> Self {
        Self {
            request_type: request_type.to_string(),
        }
    }
}

/// Response envelope.
///
/// Serialized as `{"ResponseType": "ok", "Data": [...]}` or
/// `{"ResponseType": "error", "Data": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ResponseType", content = "Data", rename_all = "lowercase")]
pub enum Response {
    Ok(Vec<Package>),
    Error(String),
}

impl From<ProtocolError> for Response {
    fn from(error: ProtocolError) -> Self {
        Response::Error(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("request exceeds {0} bytes")]
    TooLong(usize),

    #[error("invalid request: no service named {0}")]
    UnknownService(String),

    #[error("service {0} has no data")]
    NoData(String),
}

/// Answer a single request line
pub fn respond(registry: &ServiceRegistry, line: &str) -> Response {
    match route(registry, line) {
        Ok(packages) => Response::Ok(packages),
        Err(e) => {
            debug!("Rejecting request: {}", e);
            e.into()
        }
    }
}

fn route(registry: &ServiceRegistry, line: &str) -> Result<Vec<Package>, ProtocolError> {
    let request: Request = serde_json::from_str(line)?;
    let service = registry
        .lookup(&request.request_type)
        .ok_or_else(|| ProtocolError::UnknownService(request.request_type.clone()))?;

    // Asking the sync service means "sync now"; it never has data of its own
    if service.kind() == ServiceKind::Sync {
        service.send_message(Event::ForceSync);
        return Ok(Vec::new());
    }

    service
        .data()
        .map(|packages| packages.to_vec())
        .ok_or(ProtocolError::NoData(request.request_type))
}
