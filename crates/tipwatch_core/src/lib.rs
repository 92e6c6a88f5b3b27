//! Core functionality for the tipwatch block watcher
//! Contains the node data model, the height cursor and the node API trait

pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
