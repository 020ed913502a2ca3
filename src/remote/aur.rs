//! AUR RPC API implementation

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::remote::error::MetadataError;
use crate::remote::metadata::RemoteMetadata;

/// Default base URL for the AUR
pub const DEFAULT_BASE_URL: &str = "https://aur.archlinux.org";

/// RPC interface version
const RPC_VERSION: &str = "5";

const RESPONSE_TYPE_ERROR: &str = "error";
const RESPONSE_TYPE_MULTIINFO: &str = "multiinfo";

/// Envelope of every AUR RPC response
#[derive(Debug, Deserialize)]
struct AurResponse {
    #[serde(rename = "type")]
    response_type: String,
    #[serde(default)]
    results: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// A single package entry of an info response
#[derive(Debug, Deserialize)]
struct AurPackage {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Version")]
    version: String,
}

/// Remote metadata implementation for the AUR RPC interface
pub struct AurClient {
    client: reqwest::Client,
    base_url: String,
}

impl AurClient {
    /// Creates a new AurClient with a custom base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("pkgupd")
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for AurClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl RemoteMetadata for AurClient {
    async fn fetch_versions(
        &self,
        package_names: &[String],
    ) -> Result<HashMap<String, String>, MetadataError> {
        if package_names.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = vec![("v", RPC_VERSION), ("type", "info")];
        query.extend(package_names.iter().map(|name| ("arg[]", name.as_str())));
        let url = reqwest::Url::parse_with_params(&format!("{}/rpc/", self.base_url), &query)
            .map_err(|e| MetadataError::InvalidUrl(e.to_string()))?;
        debug!("Querying AUR for {} packages", package_names.len());

        let response = self.client.get(url).send().await?;

        let status = response.status();
        let body: AurResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse AUR response ({}): {}", status, e);
            MetadataError::InvalidResponse(e.to_string())
        })?;

        match body.response_type.as_str() {
            RESPONSE_TYPE_ERROR => Err(MetadataError::Server(
                body.error.unwrap_or_else(|| body.results.to_string()),
            )),
            RESPONSE_TYPE_MULTIINFO => {
                let packages: Vec<AurPackage> = serde_json::from_value(body.results)
                    .map_err(|e| MetadataError::InvalidResponse(e.to_string()))?;
                Ok(packages
                    .into_iter()
                    .map(|package| (package.name, package.version))
                    .collect())
            }
            other => Err(MetadataError::InvalidResponse(format!(
                "Unexpected response type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn fetch_versions_returns_version_per_package() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "version": 5,
                    "type": "multiinfo",
                    "resultcount": 2,
                    "results": [
                        {"Name": "yay", "Version": "12.3.5-1", "NumVotes": 2000},
                        {"Name": "paru", "Version": "2.0.3-1", "NumVotes": 1000}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client
            .fetch_versions(&names(&["yay", "paru", "not-in-aur"]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            result,
            HashMap::from([
                ("yay".to_string(), "12.3.5-1".to_string()),
                ("paru".to_string(), "2.0.3-1".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn fetch_versions_sends_info_query() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("v".into(), "5".into()),
                Matcher::UrlEncoded("type".into(), "info".into()),
                Matcher::UrlEncoded("arg[]".into(), "yay".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version": 5, "type": "multiinfo", "resultcount": 0, "results": []}"#)
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client.fetch_versions(&names(&["yay"])).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn fetch_versions_surfaces_server_error_message() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"version": 5, "type": "error", "resultcount": 0, "results": [], "error": "Too many package results."}"#,
            )
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client.fetch_versions(&names(&["yay"])).await;

        mock.assert_async().await;
        match result {
            Err(MetadataError::Server(message)) => {
                assert_eq!(message, "Too many package results.")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_versions_rejects_malformed_body() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client.fetch_versions(&names(&["yay"])).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(MetadataError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_versions_rejects_unexpected_response_type() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version": 5, "type": "search", "resultcount": 0, "results": []}"#)
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client.fetch_versions(&names(&["yay"])).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(MetadataError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_versions_skips_request_for_empty_list() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/rpc/")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = AurClient::new(&server.url());
        let result = client.fetch_versions(&[]).await.unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }
}
