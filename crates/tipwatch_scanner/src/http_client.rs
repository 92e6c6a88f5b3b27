//! HTTP client for Ergo node communication

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tipwatch_core::{Block, HeaderId, Height, NodeApi, NodeError, NodeInfo};

/// Configuration for Ergo node connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Ergo node base URL
    pub url: String,
    /// Per-request timeout in seconds, no timeout when unset
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9053".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// HTTP client for the three read endpoints the watcher needs
#[derive(Debug, Clone)]
pub struct NodeClient {
    base_url: String,
    client: reqwest::Client,
}

impl NodeClient {
    pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
        let base_url = config.url.trim_end_matches('/').to_string();

        reqwest::Url::parse(&base_url).map_err(|e| NodeError::Transport {
            url: config.url.clone(),
            message: format!("Invalid node URL: {}", e),
            timed_out: false,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("charset"),
            HeaderValue::from_static("utf-8"),
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder.build().map_err(|e| NodeError::Transport {
            url: base_url.clone(),
            message: format!("Failed to build HTTP client: {}", e),
            timed_out: false,
        })?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NodeError> {
        let url = self.endpoint(path);
        debug!(url = %url, "Node request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if !status.is_success() {
            return Err(NodeError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| NodeError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Get node info
    pub async fn node_info(&self) -> Result<NodeInfo, NodeError> {
        self.get_json("/info").await
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> NodeError {
    NodeError::Transport {
        url: url.to_string(),
        message: error.to_string(),
        timed_out: error.is_timeout(),
    }
}

#[async_trait]
impl NodeApi for NodeClient {
    async fn tip_height(&self) -> Result<Option<Height>, NodeError> {
        Ok(self.node_info().await?.tip())
    }

    async fn header_ids_at(&self, height: Height) -> Result<Vec<HeaderId>, NodeError> {
        self.get_json(&format!("/blocks/at/{}", height)).await
    }

    async fn block(&self, header_id: &HeaderId) -> Result<Block, NodeError> {
        self.get_json(&format!("/blocks/{}", header_id)).await
    }
}
