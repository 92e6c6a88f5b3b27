//! Tip tracking for an Ergo node
//! Polls the node over HTTP and turns height observations into an ordered stream of new blocks

pub mod http_client;
pub mod poll_loop;
pub mod test_helpers;
pub mod tip_tracker;

pub use http_client::{NodeClient, NodeConfig};
pub use poll_loop::{FailurePolicy, LoopState, PollConfig, PollLoop, Presenter};
pub use tip_tracker::{Advance, EmittedBlock, PollMode, TipTracker, TrackerError};
pub use tipwatch_core::{Block, Cursor, HeaderId, Height, NodeApi, NodeError, Transaction};
