//! Tip tracker: decides on each tick whether the chain advanced and fetches the new block
//!
//! The tracker holds no cursor of its own. The caller passes the last emitted
//! height into [`TipTracker::advance`] and stores the returned one, so a tick
//! that fails or is abandoned can never move the cursor.
//!
//! In [`PollMode::Tip`] only the block at the observed tip is fetched. When the
//! chain grows by more than one block between two ticks the intermediate
//! blocks are skipped: the tracker guarantees it eventually observes the
//! current tip, not that it observes every block. [`PollMode::CatchUp`] walks
//! the skipped heights instead.

use thiserror::Error;
use tracing::{debug, info};

use tipwatch_core::{Block, Cursor, HeaderId, Height, NodeApi, NodeError, Transaction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("Chain anomaly at height {height}: expected exactly one canonical header, found {found}")]
    ChainAnomaly { height: Height, found: usize },
}

impl TrackerError {
    /// Whether a later tick may succeed without intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::ChainAnomaly { .. } => true,
            TrackerError::Node(e) => e.is_transient(),
        }
    }
}

/// How far a tick reaches when the tip moved by more than one height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollMode {
    /// Fetch only the block at the tip
    #[default]
    Tip,
    /// Fetch every height after the cursor, at most `max_blocks` per tick
    CatchUp { max_blocks: u64 },
}

/// A block fetched at a given height
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedBlock {
    pub height: Height,
    pub block: Block,
}

impl EmittedBlock {
    pub fn header_id(&self) -> &HeaderId {
        self.block.id()
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.block.transactions()
    }
}

/// Result of one successful tick
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Cursor to store for the next tick
    pub cursor: Cursor,
    /// Blocks in increasing height order, empty on a no-op tick
    pub blocks: Vec<EmittedBlock>,
}

impl Advance {
    fn unchanged(cursor: Cursor) -> Self {
        Self {
            cursor,
            blocks: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All emitted transactions, block by block, in block order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.blocks.iter().flat_map(|b| b.transactions().iter())
    }
}

pub struct TipTracker<N> {
    node: N,
    mode: PollMode,
}

impl<N: NodeApi> TipTracker<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            mode: PollMode::Tip,
        }
    }

    pub fn with_mode(mut self, mode: PollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Run one reconciliation step against the node.
    ///
    /// Returns the new cursor and the blocks past `last_seen`. On error the
    /// caller must keep `last_seen`; nothing is retried here.
    pub async fn advance(&self, last_seen: Cursor) -> Result<Advance, TrackerError> {
        let latest = match self.node.tip_height().await? {
            Some(height) => height,
            None => {
                debug!("Node has no full block yet");
                return Ok(Advance::unchanged(last_seen));
            }
        };

        if !last_seen.is_behind(latest) {
            debug!(latest = %latest, last_seen = %last_seen, "No new block");
            return Ok(Advance::unchanged(last_seen));
        }

        let heights = self.heights_to_fetch(last_seen, latest);
        let mut blocks = Vec::with_capacity(heights.len());
        for height in &heights {
            blocks.push(self.fetch_at(*height).await?);
        }

        let target = heights.last().copied().unwrap_or(latest);
        if target < latest {
            info!(
                fetched = blocks.len(),
                target = %target,
                latest = %latest,
                "Catching up, more blocks pending"
            );
        }

        Ok(Advance {
            cursor: Cursor::at(target),
            blocks,
        })
    }

    fn heights_to_fetch(&self, last_seen: Cursor, latest: Height) -> Vec<Height> {
        match (self.mode, last_seen.height().and_then(Height::next)) {
            (PollMode::CatchUp { max_blocks }, Some(first)) => {
                let span = max_blocks.max(1) - 1;
                let last = latest.value().min(first.value().saturating_add(span));
                (first.value()..=last).map(Height).collect()
            }
            _ => vec![latest],
        }
    }

    /// Resolve the canonical header at `height` and fetch its block
    async fn fetch_at(&self, height: Height) -> Result<EmittedBlock, TrackerError> {
        let header_ids = self.node.header_ids_at(height).await?;
        let header_id = match header_ids.as_slice() {
            [id] => id,
            _ => {
                return Err(TrackerError::ChainAnomaly {
                    height,
                    found: header_ids.len(),
                })
            }
        };

        let block = self.node.block(header_id).await?;
        info!(
            height = %height,
            header_id = %header_id,
            transactions = block.transactions().len(),
            "New block"
        );

        Ok(EmittedBlock { height, block })
    }
}
