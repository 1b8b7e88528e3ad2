//! # Storage Module
//!
//! The foundation under the tree: positional access to the backing file,
//! footer-based root recovery, and the bounded node cache.
//!
//! ## Append-Only Discipline
//!
//! The file only ever grows during normal operation. Node records and
//! footers are appended; nothing is rewritten in place. The two exceptions
//! are the truncate-to-checkpoint rollback after a failed mutation and the
//! whole-file swap performed by compaction. This discipline is what makes
//! the trailing-footer recovery sound: every byte before the last committed
//! footer is immutable.
//!
//! ## Locking
//!
//! Cross-process coordination uses whole-file advisory locks on the backing
//! file handle (shared for reads, exclusive for mutations). The node cache
//! is private to a store instance and never shared, so no coherence protocol
//! exists beyond the file locks.
//!
//! ## Module Organization
//!
//! - [`file`]: `StoreFile`, the thin positional-I/O and locking wrapper
//! - [`footer`]: footer record codec and the two-path root locator
//! - [`cache`]: `NodeCache`, a 64-entry second-chance cache of decoded nodes

pub mod cache;
pub mod file;
pub mod footer;

pub use cache::NodeCache;
pub use file::StoreFile;
pub use footer::{locate_root, Footer};
