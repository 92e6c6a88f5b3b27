//! Core types for the tipwatch block watcher
//! Mirrors the JSON returned by an Ergo node's `/info` and `/blocks` endpoints

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a block in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(pub u64);

impl Height {
    pub fn value(self) -> u64 {
        self.0
    }

    /// The height right after this one, `None` on overflow
    pub fn next(self) -> Option<Height> {
        self.0.checked_add(1).map(Height)
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Height {
    fn from(value: u64) -> Self {
        Height(value)
    }
}

/// Last height whose block has been emitted.
///
/// `Cursor::UNSEEN` orders below every observed height, so the first tip a
/// watcher sees is always treated as new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(Option<Height>);

impl Cursor {
    /// No height observed yet
    pub const UNSEEN: Cursor = Cursor(None);

    pub fn at(height: Height) -> Self {
        Cursor(Some(height))
    }

    pub fn height(self) -> Option<Height> {
        self.0
    }

    pub fn is_unseen(self) -> bool {
        self.0.is_none()
    }

    /// Whether `height` lies strictly past this cursor
    pub fn is_behind(self, height: Height) -> bool {
        match self.0 {
            Some(seen) => height > seen,
            None => true,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(height) => write!(f, "{}", height),
            None => write!(f, "unseen"),
        }
    }
}

/// Identifier of a block header (hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderId(pub String);

impl HeaderId {
    pub fn new(id: impl Into<String>) -> Self {
        HeaderId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subset of the node's `/info` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Height of the best full block, `null` while the node has none
    #[serde(default)]
    pub full_height: Option<u64>,
    #[serde(default)]
    pub headers_height: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

impl NodeInfo {
    pub fn tip(&self) -> Option<Height> {
        self.full_height.map(Height)
    }
}

/// Autolykos proof-of-work solution carried in the header
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowSolution {
    #[serde(default)]
    pub pk: String,
    #[serde(default)]
    pub w: String,
    #[serde(default)]
    pub n: String,
    /// Either a number or a decimal string depending on node version
    #[serde(default)]
    pub d: serde_json::Value,
}

/// Block header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub id: HeaderId,
    pub parent_id: HeaderId,
    pub height: Height,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub n_bits: u64,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub votes: String,
    #[serde(default)]
    pub state_root: String,
    #[serde(default)]
    pub ad_proofs_root: String,
    #[serde(default)]
    pub transactions_root: String,
    #[serde(default)]
    pub extension_hash: String,
    #[serde(default)]
    pub pow_solutions: PowSolution,
    #[serde(default)]
    pub ad_proofs_id: Option<String>,
    #[serde(default)]
    pub transactions_id: Option<String>,
    #[serde(default)]
    pub extension_id: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Transactions section of a full block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransactions {
    pub header_id: HeaderId,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub block_version: u8,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Full block as returned by `GET /blocks/{headerId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub header: Header,
    pub block_transactions: BlockTransactions,
    #[serde(default)]
    pub size: Option<u32>,
}

impl Block {
    pub fn id(&self) -> &HeaderId {
        &self.header.id
    }

    pub fn height(&self) -> Height {
        self.header.height
    }

    /// Transactions in canonical block order
    pub fn transactions(&self) -> &[Transaction] {
        &self.block_transactions.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.block_transactions.transactions
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub data_inputs: Vec<DataInput>,
    #[serde(default)]
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub size: Option<u32>,
}

impl Transaction {
    /// Sum of all output values in nanoERG
    pub fn total_output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, output| acc.saturating_add(output.value))
    }
}

/// A spent box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub box_id: String,
    #[serde(default)]
    pub spending_proof: Option<SpendingProof>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingProof {
    #[serde(default)]
    pub proof_bytes: String,
    #[serde(default)]
    pub extension: HashMap<String, String>,
}

/// A box read but not spent by the transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInput {
    pub box_id: String,
}

/// A newly created box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub box_id: String,
    /// Value in nanoERG
    pub value: u64,
    #[serde(default)]
    pub ergo_tree: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub creation_height: u64,
    #[serde(default)]
    pub additional_registers: HashMap<String, String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub index: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub token_id: String,
    pub amount: u64,
}
