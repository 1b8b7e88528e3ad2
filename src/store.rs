//! # Store
//!
//! The public face of the engine. A `Store` owns one backing file, one
//! private node cache, and a read-only flag; every operation below enters
//! the tree through here.
//!
//! ## Lock Discipline
//!
//! Readers (`get`, `has`, `range`, `keys`, `leaves`, `to_map`) hold a
//! shared whole-file lock for the duration of one descent or walk.
//! Mutations (`set`, `remove`) hold an exclusive lock across the entire
//! read-modify-commit sequence. Compaction takes no lock of its own and
//! must be serialized externally against every other operation.
//!
//! ## Failure Semantics
//!
//! Corruption encountered while reading degrades to an absent result:
//! `get` returns `Ok(None)`, the walkers return `Ok(None)` for their
//! containers. Mutations fail loudly instead, and any failure after the
//! first byte was appended rolls the file back to its pre-operation length,
//! so the previously committed footer and tree remain authoritative. The
//! unreclaimed bytes of the aborted attempt sit before the restored end of
//! file and are collected by the next compaction.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{ensure, eyre, Result};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::config::MAX_FILE_SIZE;
use crate::storage::{locate_root, NodeCache, StoreFile};
use crate::tree::{Node, TreeReader, TreeWriter};

pub struct Store {
    file: StoreFile,
    cache: Mutex<NodeCache>,
    read_only: bool,
}

impl Store {
    /// Opens the store at `path`, creating and initializing the file when
    /// it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_inner(path.as_ref(), false)
    }

    /// Opens an existing store without write access. Mutating operations
    /// fail on the returned store.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_inner(path.as_ref(), true)
    }

    fn open_inner(path: &Path, read_only: bool) -> Result<Self> {
        let file = if path.exists() {
            StoreFile::open(path, read_only)?
        } else {
            ensure!(
                !read_only,
                "store file {} does not exist",
                path.display()
            );
            let file = StoreFile::create(path)?;
            let mut writer = TreeWriter::new(&file, 0);
            let root = writer.append_node(&Node::Leaf(Vec::new()))?;
            writer.append_footer(root)?;
            file.sync()?;
            file
        };

        let len = file.len()?;
        ensure!(
            len <= MAX_FILE_SIZE,
            "store file {} is {} bytes, past the {} byte limit of 32-bit offsets",
            path.display(),
            len,
            MAX_FILE_SIZE
        );

        Ok(Self {
            file,
            cache: Mutex::new(NodeCache::new()),
            read_only,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn file_size(&self) -> Result<u64> {
        self.file.len()
    }

    fn reader(&self) -> TreeReader<'_> {
        TreeReader::new(&self.file, &self.cache)
    }

    /// Point lookup. `Ok(None)` covers both a missing key and a store whose
    /// tree cannot be resolved.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.file.lock_shared()?;
        let value = self.reader().get(key);
        self.file.unlock()?;
        Ok(value)
    }

    pub fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts or replaces `key`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.update(key, Some(value))
    }

    /// Deletes `key`. Removing an absent key still commits a new tree
    /// version.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.update(key, None)
    }

    fn update(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        ensure!(
            !self.read_only,
            "store {} is opened read-only",
            self.path().display()
        );

        self.file.lock_exclusive()?;
        let checkpoint = match self.file.len() {
            Ok(len) => len,
            Err(err) => {
                let _ = self.file.unlock();
                return Err(err);
            }
        };

        let result = self.update_locked(key, value, checkpoint);
        if result.is_err() {
            self.rollback(checkpoint);
        }
        let unlocked = self.file.unlock();
        result.and(unlocked)
    }

    fn update_locked(&self, key: &[u8], value: Option<&[u8]>, checkpoint: u64) -> Result<()> {
        ensure!(
            checkpoint <= MAX_FILE_SIZE,
            "store file already at the {} byte limit",
            MAX_FILE_SIZE
        );

        let reader = self.reader();
        let mut writer = TreeWriter::new(&self.file, checkpoint as u32);
        let root = writer.apply(&reader, key, value)?;
        self.file.sync()?;
        writer.append_footer(root)?;
        self.file.sync()?;
        Ok(())
    }

    /// Restores the pre-mutation file length. Cached nodes decoded from the
    /// truncated tail would alias future writes at the same offsets, so the
    /// cache goes with it.
    fn rollback(&self, checkpoint: u64) {
        warn!(
            "mutation on {} failed, truncating back to {} bytes",
            self.path().display(),
            checkpoint
        );
        if let Err(err) = self.file.truncate(checkpoint) {
            warn!("rollback truncate failed: {err}");
        }
        self.cache.lock().clear();
    }

    /// All entries with `start <= key < end`, byte-wise. `Ok(None)` when
    /// the tree cannot be resolved.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Result<Option<BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.file.lock_shared()?;
        let out = self.reader().range(start, end);
        self.file.unlock()?;
        Ok(out)
    }

    /// Every key in the store, byte-wise sorted.
    pub fn keys(&self) -> Result<Option<Vec<Vec<u8>>>> {
        self.file.lock_shared()?;
        let out = self.reader().keys();
        self.file.unlock()?;
        Ok(out)
    }

    /// First key of every leaf mapped to the leaf's file offset.
    pub fn leaves(&self) -> Result<Option<BTreeMap<Vec<u8>, u32>>> {
        self.file.lock_shared()?;
        let out = self.reader().leaves();
        self.file.unlock()?;
        Ok(out)
    }

    /// The whole store as a map, by the convention that real keys stay
    /// below the 0xFF byte ceiling.
    pub fn to_map(&self) -> Result<Option<BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.range(&[0x00], &[0xFF])
    }

    /// Rewrites the live tree into a fresh file and atomically swaps it in,
    /// discarding every unreachable node version. Callers must serialize
    /// compaction against all other operations on this file.
    pub fn compact(&mut self) -> Result<()> {
        ensure!(
            !self.read_only,
            "store {} is opened read-only",
            self.path().display()
        );

        let target = compact_path(self.path());
        if let Err(err) = self.write_compacted(&target) {
            if target.exists() {
                let _ = fs::remove_file(&target);
            }
            return Err(err);
        }

        // The rename replaces the old file in one step; its handle is
        // released when the reopened handle takes its place. A rename
        // failure leaves the original untouched and still open.
        let path = self.path().to_path_buf();
        if let Err(err) = fs::rename(&target, &path) {
            let _ = fs::remove_file(&target);
            return Err(err.into());
        }

        self.file = StoreFile::open(&path, false)?;
        self.cache.lock().clear();
        debug!(
            "compacted {} down to {} bytes",
            path.display(),
            self.file.len().unwrap_or(0)
        );
        Ok(())
    }

    fn write_compacted(&self, target: &Path) -> Result<()> {
        let root = locate_root(&self.file)
            .ok_or_else(|| eyre!("no intact footer in {}, cannot compact", self.path().display()))?;

        let dst = StoreFile::create(target)?;
        let mut writer = TreeWriter::new(&dst, 0);
        let new_root = writer.copy_tree(&self.reader(), root)?;
        writer.append_footer(new_root)?;
        dst.sync()?;
        Ok(())
    }

    /// Discards every cached node. Subsequent reads re-decode from disk.
    pub fn drop_cache(&self) {
        self.cache.lock().clear();
    }

    /// Flushes and closes the store. Dropping the store closes it without
    /// the final flush.
    pub fn close(self) -> Result<()> {
        if !self.read_only {
            self.file.sync()?;
        }
        Ok(())
    }
}

fn compact_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".compact");
    PathBuf::from(name)
}
