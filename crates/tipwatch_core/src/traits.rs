//! Core traits for the tipwatch block watcher

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Block, HeaderId, Height};

/// Error types for node read operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Request could not be built or the node could not be reached
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timed_out: bool,
    },
    /// Node answered with a non-success status
    #[error("Node returned status {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },
    /// Body was not valid JSON or did not have the expected shape
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl NodeError {
    /// Whether the same request may succeed if simply tried again later
    pub fn is_transient(&self) -> bool {
        match self {
            NodeError::Transport { .. } => true,
            NodeError::Status { status, .. } => *status >= 500 || *status == 429,
            NodeError::Decode { .. } => false,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NodeError::Transport { url, .. }
            | NodeError::Status { url, .. }
            | NodeError::Decode { url, .. } => url,
        }
    }
}

/// Read-only view of a ledger node
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Height of the node's best full block, `None` if it has none yet
    async fn tip_height(&self) -> Result<Option<Height>, NodeError>;

    /// Header ids the node reports at `height` on its main chain
    async fn header_ids_at(&self, height: Height) -> Result<Vec<HeaderId>, NodeError>;

    /// Full block for a header id
    async fn block(&self, header_id: &HeaderId) -> Result<Block, NodeError>;
}
