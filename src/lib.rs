//! # arbordb - Embedded Append-Only B-Tree Store
//!
//! arbordb persists sorted byte-string-keyed records to a single flat file,
//! supporting point lookups, half-open range scans, upsert/delete, and online
//! compaction. Access is logarithmic through a self-balancing multi-way tree
//! whose internal nodes reference children by file offset.
//!
//! ## Quick Start
//!
//! ```ignore
//! use arbordb::Store;
//!
//! let mut store = Store::open("catalog.db")?;
//! store.set(b"fr", b"France")?;
//! assert_eq!(store.get(b"fr")?.as_deref(), Some(&b"France"[..]));
//! store.remove(b"fr")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │          Public API (Store)          │
//! ├─────────────────────────────────────┤
//! │  Tree (descent, rebalance, walkers)  │
//! ├──────────────────┬──────────────────┤
//! │   Node Codec     │    Node Cache     │
//! ├──────────────────┴──────────────────┤
//! │  Storage (file, footer, file locks)  │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Format
//!
//! The backing file is a flat sequence of length-prefixed node records,
//! interspersed with footer records:
//!
//! ```text
//! [u32 BE length][2-byte tag "kv"|"kp"][encoded ordered map]   node record
//! [u32 BE root_offset][0xFF 'b' 't' 'r' 'e' 'e']               footer
//! ```
//!
//! Mutation is copy-on-write: every `set`/`remove` appends fresh nodes and
//! commits by appending a new footer. Old node versions become unreachable
//! garbage until [`Store::compact`] rewrites the live tree into a fresh file.
//! The trailing footer is the single source of truth for the root pointer;
//! a truncated tail is survivable because recovery scans backward for the
//! most recent intact footer.
//!
//! ## Concurrency
//!
//! The engine is synchronous. Cross-process coordination uses whole-file
//! advisory locks: shared for reads, exclusive for mutations. Compaction
//! performs its own file swap and must be serialized externally.
//!
//! ## Module Overview
//!
//! - [`store`]: public `Store` API, lock discipline, rollback, compaction swap
//! - [`tree`]: node codec plus descent, rebalancing, and walker algorithms
//! - [`storage`]: backing file access, footer recovery, bounded node cache
//! - [`encoding`]: varint primitives used by the node codec
//! - [`config`]: fixed engine constants (branching factor, cache size)

pub mod config;
pub mod encoding;
pub mod storage;
pub mod store;
pub mod tree;

pub use store::Store;
pub use tree::Node;
