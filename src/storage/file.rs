//! # Backing File Access
//!
//! `StoreFile` wraps the single flat file behind a store: positional reads,
//! positional writes (the mutator manages its own append cursor), explicit
//! truncation for rollback, and whole-file advisory locking.
//!
//! Reads of node records are deliberately forgiving: a record whose length
//! prefix runs past end-of-file, or that cannot be read in full, yields
//! `None` rather than an error, so torn tails and garbage regions surface
//! as "node not found" to the layers above.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::Result;
use fs2::FileExt;
use log::debug;

use crate::config::FRAME_PREFIX_LEN;

pub struct StoreFile {
    file: File,
    path: PathBuf,
}

impl StoreFile {
    /// Opens an existing store file. `read_only` controls the open mode;
    /// mutation entry points enforce the flag separately.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Creates a fresh, empty file, truncating any previous content. Used
    /// for new stores and for the compaction target.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Fills `buf` from the file starting at `offset`. Fails on short reads.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let mut handle = &self.file;
        handle.seek(SeekFrom::Start(offset))?;
        handle.read_exact(buf)
    }

    /// Reads one length-prefixed record at `offset`, returning its unframed
    /// body. Any truncation or out-of-bounds length yields `None`.
    pub fn read_record(&self, offset: u32) -> Option<Vec<u8>> {
        let len = self.len().ok()?;
        let start = offset as u64;
        if start + FRAME_PREFIX_LEN as u64 > len {
            return None;
        }

        let mut prefix = [0u8; FRAME_PREFIX_LEN];
        self.read_exact_at(start, &mut prefix).ok()?;
        let record_len = u32::from_be_bytes(prefix) as u64;
        if start + FRAME_PREFIX_LEN as u64 + record_len > len {
            debug!("record at offset {offset} claims {record_len} bytes past end of file");
            return None;
        }

        let mut record = vec![0u8; record_len as usize];
        self.read_exact_at(start + FRAME_PREFIX_LEN as u64, &mut record)
            .ok()?;
        Some(record)
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut handle = &self.file;
        handle.seek(SeekFrom::Start(offset))?;
        handle.write_all(bytes)?;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn truncate(&self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    pub fn lock_shared(&self) -> Result<()> {
        FileExt::lock_shared(&self.file)?;
        Ok(())
    }

    pub fn lock_exclusive(&self) -> Result<()> {
        FileExt::lock_exclusive(&self.file)?;
        Ok(())
    }

    pub fn unlock(&self) -> Result<()> {
        FileExt::unlock(&self.file)?;
        Ok(())
    }
}
