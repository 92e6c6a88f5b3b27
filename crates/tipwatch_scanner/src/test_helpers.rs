//! Scripted in-memory node and presenter for exercising the tracker and poll loop

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use tipwatch_core::{
    Block, BlockTransactions, Header, HeaderId, Height, Input, NodeApi, NodeError, Output,
    PowSolution, Transaction,
};

use crate::poll_loop::Presenter;

/// A call received by [`MockNode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
    TipHeight,
    HeaderIdsAt(Height),
    Block(HeaderId),
}

#[derive(Default)]
struct MockState {
    tips: VecDeque<Result<Option<Height>, NodeError>>,
    header_ids: HashMap<Height, VecDeque<Vec<HeaderId>>>,
    blocks: HashMap<HeaderId, Block>,
    stall_block_fetches: bool,
    calls: Vec<NodeCall>,
}

/// Node whose answers are scripted up front.
///
/// Scripted answers are consumed one per call and the last one repeats, so
/// `push_tip(100)` alone makes the node report 100 forever.
#[derive(Clone, Default)]
pub struct MockNode {
    state: Arc<Mutex<MockState>>,
    block_fetch_started: Arc<Notify>,
}

/// Take the front entry, leaving the last one in place
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_tip(&self, height: u64) {
        self.state().tips.push_back(Ok(Some(Height(height))));
    }

    /// Report `fullHeight: null`
    pub fn push_no_tip(&self) {
        self.state().tips.push_back(Ok(None));
    }

    pub fn push_tip_error(&self, error: NodeError) {
        self.state().tips.push_back(Err(error));
    }

    pub fn push_header_ids(&self, height: u64, ids: &[&str]) {
        let ids = ids.iter().map(|id| HeaderId::new(*id)).collect();
        self.state()
            .header_ids
            .entry(Height(height))
            .or_default()
            .push_back(ids);
    }

    pub fn add_block(&self, block: Block) {
        self.state().blocks.insert(block.id().clone(), block);
    }

    /// Make `id` the only header at `height` and serve a block with the given transactions
    pub fn add_canonical_block(&self, height: u64, id: &str, tx_ids: &[&str]) {
        self.push_header_ids(height, &[id]);
        self.add_block(make_block(height, id, tx_ids));
    }

    /// Block fetches never complete
    pub fn stall_block_fetches(&self) {
        self.state().stall_block_fetches = true;
    }

    /// Notified each time a block fetch begins
    pub fn block_fetch_started(&self) -> Arc<Notify> {
        Arc::clone(&self.block_fetch_started)
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl NodeApi for MockNode {
    async fn tip_height(&self) -> Result<Option<Height>, NodeError> {
        let mut state = self.state();
        state.calls.push(NodeCall::TipHeight);
        next_scripted(&mut state.tips).unwrap_or(Ok(None))
    }

    async fn header_ids_at(&self, height: Height) -> Result<Vec<HeaderId>, NodeError> {
        let mut state = self.state();
        state.calls.push(NodeCall::HeaderIdsAt(height));
        Ok(state
            .header_ids
            .get_mut(&height)
            .and_then(next_scripted)
            .unwrap_or_default())
    }

    async fn block(&self, header_id: &HeaderId) -> Result<Block, NodeError> {
        let (stall, block) = {
            let mut state = self.state();
            state.calls.push(NodeCall::Block(header_id.clone()));
            (state.stall_block_fetches, state.blocks.get(header_id).cloned())
        };
        self.block_fetch_started.notify_one();

        if stall {
            std::future::pending::<()>().await;
        }

        block.ok_or_else(|| NodeError::Status {
            url: format!("mock://blocks/{}", header_id),
            status: 404,
            body: "{\"error\":404,\"reason\":\"not-found\"}".to_string(),
        })
    }
}

/// Presenter that records what it was handed
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    presented: Arc<Mutex<Vec<(Height, String)>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(height, transaction id)` pairs in presentation order
    pub fn presented(&self) -> Vec<(Height, String)> {
        self.presented
            .lock()
            .map(|presented| presented.clone())
            .unwrap_or_default()
    }

    pub fn presented_ids(&self) -> Vec<String> {
        self.presented().into_iter().map(|(_, id)| id).collect()
    }
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, height: Height, transaction: &Transaction) {
        if let Ok(mut presented) = self.presented.lock() {
            presented.push((height, transaction.id.clone()));
        }
    }
}

/// Build a block with one input and one output per transaction
pub fn make_block(height: u64, id: &str, tx_ids: &[&str]) -> Block {
    Block {
        header: Header {
            id: HeaderId::new(id),
            parent_id: HeaderId::new(format!("parent_of_{}", id)),
            height: Height(height),
            timestamp: 1_700_000_000_000 + height * 120_000,
            version: 3,
            n_bits: 117_714_839,
            difficulty: "1199990374400".to_string(),
            votes: "000000".to_string(),
            state_root: String::new(),
            ad_proofs_root: String::new(),
            transactions_root: String::new(),
            extension_hash: String::new(),
            pow_solutions: PowSolution::default(),
            ad_proofs_id: None,
            transactions_id: None,
            extension_id: None,
            size: None,
        },
        block_transactions: BlockTransactions {
            header_id: HeaderId::new(id),
            transactions: tx_ids
                .iter()
                .map(|tx_id| make_transaction(tx_id, height))
                .collect(),
            block_version: 3,
            size: None,
        },
        size: None,
    }
}

pub fn make_transaction(id: &str, height: u64) -> Transaction {
    Transaction {
        id: id.to_string(),
        inputs: vec![Input {
            box_id: format!("{}_in0", id),
            spending_proof: None,
        }],
        data_inputs: vec![],
        outputs: vec![Output {
            box_id: format!("{}_out0", id),
            value: 1_000_000_000,
            ergo_tree: "0008cd03".to_string(),
            assets: vec![],
            creation_height: height,
            additional_registers: HashMap::new(),
            transaction_id: Some(id.to_string()),
            index: Some(0),
        }],
        size: Some(200),
    }
}
