//! # Tree Module
//!
//! The B-tree proper: the node representation with its on-disk codec, and
//! the algorithms that operate on nodes through a backing file.
//!
//! ## Node Types
//!
//! - **Leaf** (`b"kv"` tag): ordered map from key to opaque value blob.
//! - **Interior** (`b"kp"` tag): ordered map from key to child file offset.
//!   The key at each entry is the smallest key reachable through that child,
//!   so descent picks the rightmost entry whose key is at or below the
//!   search key.
//!
//! Nodes hold at most [`NODE_CAPACITY`](crate::config::NODE_CAPACITY)
//! entries and are immutable once written: every mutation appends fresh
//! copies at new offsets and republishes the root through a footer.
//!
//! ## Submodules
//!
//! - [`node`]: `Node` enum, record codec, entry-level edit helpers
//! - [`tree`]: descent, the copy-on-write rebalance climb, range and leaf
//!   walkers, and the compaction copy walk

pub mod node;
pub mod tree;

pub use node::Node;
pub use tree::{TreeReader, TreeWriter};
