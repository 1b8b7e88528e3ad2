//! # Footer Records and Root Recovery
//!
//! A footer is the commit record of this engine: a 4-byte big-endian root
//! offset followed by the 6-byte magic tag `0xFF "btree"`. Every successful
//! mutation appends one, so a store file accumulates stale footers over its
//! life; only the last one is authoritative.
//!
//! ```text
//! [node][node][footer][node][node][node][footer]
//!                                          ^ current root pointer
//! ```
//!
//! ## Recovery
//!
//! [`locate_root`] first tries the fast path: the file ends with a footer
//! whenever the last write completed cleanly. When it does not (a crash
//! mid-append left a torn tail), [`scan_for_root`] walks backward from
//! end-of-file in [`SCAN_STRIDE`]-byte steps, examining [`SCAN_WINDOW`]-byte
//! windows for the rightmost intact magic tag. Windows overlap by a full
//! stride, so a tag straddling one window boundary is seen whole in the
//! next; a match without four preceding bytes in its window is skipped and
//! picked up there instead. The rightmost surviving footer is by
//! construction the most recently committed one.
//!
//! No tag anywhere means the store is unreadable. There is no repair beyond
//! this scan.

use eyre::Result;
use log::warn;
use zerocopy::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{FOOTER_LEN, FOOTER_MAGIC, SCAN_STRIDE, SCAN_WINDOW};
use crate::storage::StoreFile;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct Footer {
    root: U32,
    magic: [u8; 6],
}

const _: () = assert!(std::mem::size_of::<Footer>() == FOOTER_LEN);

impl Footer {
    pub fn new(root: u32) -> Self {
        Self {
            root: U32::new(root),
            magic: FOOTER_MAGIC,
        }
    }

    pub fn root(&self) -> u32 {
        self.root.get()
    }

    pub fn is_valid(&self) -> bool {
        self.magic == FOOTER_MAGIC
    }

    pub fn to_bytes(&self) -> [u8; FOOTER_LEN] {
        let mut out = [0u8; FOOTER_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to parse footer: {:?}", e))
    }
}

/// Resolves the current root offset, or `None` when the file holds no
/// intact footer at all.
pub fn locate_root(file: &StoreFile) -> Option<u32> {
    if let Some(root) = trailing_root(file) {
        return Some(root);
    }
    warn!(
        "no clean footer at the end of {}, scanning backward for the last commit",
        file.path().display()
    );
    scan_for_root(file)
}

/// Fast path: the file ends with an intact footer.
fn trailing_root(file: &StoreFile) -> Option<u32> {
    let len = file.len().ok()?;
    if len < FOOTER_LEN as u64 {
        return None;
    }
    let mut buf = [0u8; FOOTER_LEN];
    file.read_exact_at(len - FOOTER_LEN as u64, &mut buf).ok()?;
    let footer = Footer::parse(&buf).ok()?;
    footer.is_valid().then(|| footer.root())
}

/// Fallback: backward stride scan for the rightmost intact magic tag.
fn scan_for_root(file: &StoreFile) -> Option<u32> {
    let len = file.len().ok()?;
    let mut end = len;

    loop {
        let start = end.saturating_sub(SCAN_WINDOW as u64);
        let mut window = vec![0u8; (end - start) as usize];
        file.read_exact_at(start, &mut window).ok()?;

        if window.len() >= FOOTER_MAGIC.len() {
            if let Some(idx) = window
                .windows(FOOTER_MAGIC.len())
                .rposition(|candidate| candidate == FOOTER_MAGIC)
            {
                // A match without four preceding bytes in this window may be
                // a tag split across the window boundary; the overlapping
                // next window sees it whole.
                if idx >= 4 {
                    let root = u32::from_be_bytes(window[idx - 4..idx].try_into().unwrap()); // INVARIANT: idx >= 4
                    return Some(root);
                }
            }
        }

        if start == 0 {
            return None;
        }
        end = end.saturating_sub(SCAN_STRIDE as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with(dir: &TempDir, bytes: &[u8]) -> StoreFile {
        let file = StoreFile::create(&dir.path().join("footer.db")).unwrap();
        file.write_at(0, bytes).unwrap();
        file
    }

    fn footer_bytes(root: u32) -> Vec<u8> {
        Footer::new(root).to_bytes().to_vec()
    }

    #[test]
    fn footer_round_trips() {
        let footer = Footer::new(4096);
        let bytes = footer.to_bytes();
        let parsed = Footer::parse(&bytes).unwrap();
        assert!(parsed.is_valid());
        assert_eq!(parsed.root(), 4096);
    }

    #[test]
    fn trailing_footer_resolves_on_the_fast_path() {
        let dir = TempDir::new().unwrap();
        let mut content = vec![0u8; 100];
        content.extend_from_slice(&footer_bytes(42));
        let file = file_with(&dir, &content);
        assert_eq!(locate_root(&file), Some(42));
    }

    #[test]
    fn last_of_several_footers_wins() {
        let dir = TempDir::new().unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&footer_bytes(7));
        content.extend_from_slice(&[0u8; 50]);
        content.extend_from_slice(&footer_bytes(99));
        let file = file_with(&dir, &content);
        assert_eq!(locate_root(&file), Some(99));
    }

    #[test]
    fn torn_tail_falls_back_to_the_scan() {
        let dir = TempDir::new().unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&[1u8; 30]);
        content.extend_from_slice(&footer_bytes(30));
        // A write that died partway through: garbage plus half a footer.
        content.extend_from_slice(&[2u8; 77]);
        content.extend_from_slice(&footer_bytes(107)[..5].to_vec());
        let file = file_with(&dir, &content);
        assert_eq!(locate_root(&file), Some(30));
    }

    #[test]
    fn footer_buried_deep_in_a_long_tail_is_found() {
        let dir = TempDir::new().unwrap();
        let mut content = Vec::new();
        content.extend_from_slice(&[1u8; 200]);
        content.extend_from_slice(&footer_bytes(200));
        // Several kilobytes of garbage force many scan strides.
        content.extend_from_slice(&[0xABu8; 5000]);
        let file = file_with(&dir, &content);
        assert_eq!(locate_root(&file), Some(200));
    }

    #[test]
    fn file_without_any_magic_has_no_root() {
        let dir = TempDir::new().unwrap();
        let file = file_with(&dir, &[0u8; 4096]);
        assert_eq!(locate_root(&file), None);
    }

    #[test]
    fn empty_file_has_no_root() {
        let dir = TempDir::new().unwrap();
        let file = StoreFile::create(&dir.path().join("empty.db")).unwrap();
        assert_eq!(locate_root(&file), None);
    }

    #[test]
    fn magic_in_the_first_four_bytes_is_not_a_footer() {
        let dir = TempDir::new().unwrap();
        // Magic at offset 0 has no preceding root bytes; it must be skipped.
        let file = file_with(&dir, &FOOTER_MAGIC);
        assert_eq!(locate_root(&file), None);
    }

    #[test]
    fn tag_straddling_a_window_boundary_is_still_found() {
        let dir = TempDir::new().unwrap();
        let mut content = vec![0u8; 300];
        let footer = footer_bytes(77);
        // Place the footer so its tag crosses the 256-byte window line
        // counted back from the end of the garbage tail.
        content.extend_from_slice(&footer);
        content.extend_from_slice(&[9u8; SCAN_WINDOW - 3]);
        let file = file_with(&dir, &content);
        assert_eq!(locate_root(&file), Some(77));
    }
}
