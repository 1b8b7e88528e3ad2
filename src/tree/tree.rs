//! # Tree Algorithms
//!
//! Everything that walks or rewrites the tree through a backing file:
//!
//! - [`TreeReader`]: root resolution, root-to-leaf descent, point lookup,
//!   the level-by-level range walk, and the breadth-first leaf walk.
//! - [`TreeWriter`]: the copy-on-write rebalance climb behind `set` and
//!   `remove`, footer appends, and the post-order compaction copy.
//!
//! ## Descent
//!
//! Descent resolves the root from the trailing footer, then repeatedly
//! binary-searches the current interior node for the rightmost key at or
//! below the search key and follows that child offset. The full path of
//! `(offset, node)` pairs is returned because the mutator needs every
//! ancestor for rebalancing. Any undecodable node aborts the descent with
//! `None`; readers translate that to an absent value.
//!
//! ## Rebalance Climb
//!
//! A mutation copies the target leaf, applies the edit, and climbs back to
//! the root. At each level the node merges with an immediate sibling when
//! it has sunk to the fill floor, splits into even chunks when it has
//! overflowed, and is appended to the file at the write cursor. The parent
//! under construction starts from the popped ancestor with the replaced
//! child's entry removed and receives one `(first key, offset)` entry per
//! chunk written. The climb ends when the parent under construction holds
//! at most one entry; that entry's pointer is the new root. Nothing written
//! becomes reachable until the store appends a footer for the new root, so
//! a failure at any point leaves the committed tree untouched.
//!
//! All writes stay below [`MAX_FILE_SIZE`] so offsets fit the 32-bit
//! pointers in interior nodes and footers.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use eyre::{bail, ensure, eyre, Result};
use log::debug;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::config::{MAX_FILE_SIZE, MAX_TREE_DEPTH, NODE_MIN_FILL};
use crate::storage::{locate_root, Footer, NodeCache, StoreFile};
use crate::tree::node::{descend_index, Node};

/// Root-to-leaf path of `(offset, node)` pairs. Inline capacity covers any
/// realistic depth at branching factor 16.
pub type NodePath = SmallVec<[(u32, Arc<Node>); 8]>;

pub struct TreeReader<'a> {
    file: &'a StoreFile,
    cache: &'a Mutex<NodeCache>,
}

impl<'a> TreeReader<'a> {
    pub fn new(file: &'a StoreFile, cache: &'a Mutex<NodeCache>) -> Self {
        Self { file, cache }
    }

    /// Loads and decodes the node at `offset`, consulting the cache first.
    /// Unreadable or undecodable records yield `None`.
    pub(crate) fn load(&self, offset: u32) -> Option<Arc<Node>> {
        if let Some(node) = self.cache.lock().get(offset) {
            return Some(node);
        }
        let record = self.file.read_record(offset)?;
        let node = match Node::decode(&record) {
            Ok(node) => Arc::new(node),
            Err(err) => {
                debug!("node at offset {offset} failed to decode: {err}");
                return None;
            }
        };
        self.cache.lock().insert(offset, Arc::clone(&node));
        Some(node)
    }

    /// Current root offset per the trailing (or recovered) footer.
    pub fn root(&self) -> Option<u32> {
        locate_root(self.file)
    }

    /// Walks from `root` to the leaf responsible for `key`, returning every
    /// node visited in order.
    pub fn descend(&self, root: u32, key: &[u8]) -> Option<NodePath> {
        let mut path = NodePath::new();
        let mut offset = root;

        loop {
            if path.len() >= MAX_TREE_DEPTH {
                debug!("descent exceeded {MAX_TREE_DEPTH} levels, treating tree as corrupt");
                return None;
            }
            let node = self.load(offset)?;
            match node.as_ref() {
                Node::Leaf(_) => {
                    path.push((offset, node));
                    return Some(path);
                }
                Node::Interior(entries) => {
                    if entries.is_empty() {
                        return None;
                    }
                    let child = entries[descend_index(entries, key)].1;
                    path.push((offset, Arc::clone(&node)));
                    offset = child;
                }
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let root = self.root()?;
        let path = self.descend(root, key)?;
        let (_, leaf) = path.last()?;
        leaf.leaf_get(key).map(|value| value.to_vec())
    }

    /// All entries with `start <= key < end`, or `None` when any node along
    /// the way fails to resolve.
    pub fn range(&self, start: &[u8], end: &[u8]) -> Option<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut out = BTreeMap::new();
        if start >= end {
            return Some(out);
        }

        let root = self.root()?;
        let mut frontier: Vec<Arc<Node>> = vec![self.load(root)?];

        for _ in 0..MAX_TREE_DEPTH {
            if frontier.iter().all(|node| node.is_leaf()) {
                for node in &frontier {
                    if let Node::Leaf(entries) = node.as_ref() {
                        for (key, value) in entries {
                            if key.as_slice() >= start && key.as_slice() < end {
                                out.insert(key.clone(), value.clone());
                            }
                        }
                    }
                }
                return Some(out);
            }

            // Merge the in-order sibling entries of this level, then keep
            // the contiguous span of children between the descend targets
            // of the two bounds.
            let mut merged: Vec<(Vec<u8>, u32)> = Vec::new();
            for node in &frontier {
                match node.as_ref() {
                    Node::Interior(entries) => merged.extend(entries.iter().cloned()),
                    // Leaves mixed into an interior level mean the tree
                    // lost its uniform depth.
                    Node::Leaf(_) => return None,
                }
            }
            if merged.is_empty() {
                return None;
            }

            let lo = descend_index(&merged, start);
            let hi = descend_index(&merged, end);
            let mut next = Vec::with_capacity(hi - lo + 1);
            for (_, child) in &merged[lo..=hi] {
                next.push(self.load(*child)?);
            }
            frontier = next;
        }

        debug!("range walk exceeded {MAX_TREE_DEPTH} levels, treating tree as corrupt");
        None
    }

    /// First key of every leaf mapped to the leaf's offset, in key order.
    pub fn leaves(&self) -> Option<BTreeMap<Vec<u8>, u32>> {
        let root = self.root()?;
        let mut out = BTreeMap::new();
        let mut queue = VecDeque::from([root]);
        let mut seen: HashSet<u32> = HashSet::from([root]);

        while let Some(offset) = queue.pop_front() {
            let node = self.load(offset)?;
            match node.as_ref() {
                Node::Leaf(_) => {
                    let first = node.first_key().unwrap_or_default().to_vec();
                    out.insert(first, offset);
                }
                Node::Interior(entries) => {
                    for (_, child) in entries {
                        if seen.insert(*child) {
                            queue.push_back(*child);
                        }
                    }
                }
            }
        }
        Some(out)
    }

    /// Every key in the store, byte-wise sorted.
    pub fn keys(&self) -> Option<Vec<Vec<u8>>> {
        let leaves = self.leaves()?;
        let mut out = Vec::new();
        for offset in leaves.values() {
            let node = self.load(*offset)?;
            match node.as_ref() {
                Node::Leaf(entries) => out.extend(entries.iter().map(|(k, _)| k.clone())),
                Node::Interior(_) => return None,
            }
        }
        Some(out)
    }
}

pub struct TreeWriter<'a> {
    file: &'a StoreFile,
    cursor: u32,
}

impl<'a> TreeWriter<'a> {
    /// A writer appending at `cursor` (the pre-mutation end of file, or 0
    /// for a fresh compaction target).
    pub fn new(file: &'a StoreFile, cursor: u32) -> Self {
        Self { file, cursor }
    }

    /// Appends one node record at the cursor, returning its offset.
    pub fn append_node(&mut self, node: &Node) -> Result<u32> {
        let frame = node.encode_framed()?;
        let offset = self.cursor;
        let end = offset as u64 + frame.len() as u64;
        ensure!(
            end <= MAX_FILE_SIZE,
            "write would grow {} past the {} byte limit",
            self.file.path().display(),
            MAX_FILE_SIZE
        );
        self.file.write_at(offset as u64, &frame)?;
        self.cursor = end as u32;
        Ok(offset)
    }

    /// Appends a footer publishing `root` as the current root offset.
    pub fn append_footer(&mut self, root: u32) -> Result<()> {
        let bytes = Footer::new(root).to_bytes();
        let end = self.cursor as u64 + bytes.len() as u64;
        ensure!(
            end <= MAX_FILE_SIZE,
            "footer would grow {} past the {} byte limit",
            self.file.path().display(),
            MAX_FILE_SIZE
        );
        self.file.write_at(self.cursor as u64, &bytes)?;
        self.cursor = end as u32;
        Ok(())
    }

    /// Applies one upsert (`Some(value)`) or delete (`None`) and rebalances
    /// bottom-up, appending fresh copies of every touched node. Returns the
    /// new root offset; the caller publishes it with a footer.
    pub fn apply(&mut self, reader: &TreeReader, key: &[u8], value: Option<&[u8]>) -> Result<u32> {
        let root = reader
            .root()
            .ok_or_else(|| eyre!("no intact footer found in {}", self.file.path().display()))?;
        let mut path = reader
            .descend(root, key)
            .ok_or_else(|| eyre!("descent failed: unreadable node on the path"))?;
        let Some((leaf_offset, leaf)) = path.pop() else {
            bail!("descent returned an empty path");
        };

        let mut current: Node = leaf.as_ref().clone();
        match value {
            Some(value) => current.upsert(key, value)?,
            None => current.delete(key)?,
        }
        let mut current_offset = leaf_offset;

        loop {
            let ancestor = path.pop();
            let mut parent: Vec<(Vec<u8>, u32)> = match &ancestor {
                Some((_, node)) => match node.as_ref() {
                    Node::Interior(entries) => entries.clone(),
                    Node::Leaf(_) => bail!("leaf node in interior position at the tree's spine"),
                },
                None => Vec::new(),
            };

            // Underflow: absorb an immediate sibling so no node lingers at
            // or below the fill floor while an ancestor can still re-point it.
            if ancestor.is_some() && current.len() <= NODE_MIN_FILL {
                if let Some(pos) = parent.iter().position(|(_, off)| *off == current_offset) {
                    let sibling_pos = if pos > 0 {
                        Some(pos - 1)
                    } else if pos + 1 < parent.len() {
                        Some(pos + 1)
                    } else {
                        None
                    };
                    if let Some(sibling_pos) = sibling_pos {
                        let sibling_offset = parent[sibling_pos].1;
                        let sibling = reader.load(sibling_offset).ok_or_else(|| {
                            eyre!("sibling node at offset {sibling_offset} is unreadable")
                        })?;
                        current.merge_from(&sibling)?;
                        parent.remove(sibling_pos);
                    }
                }
            }

            // The rewritten node supersedes its old index entry.
            if let Some(pos) = parent.iter().position(|(_, off)| *off == current_offset) {
                parent.remove(pos);
            }

            current.sort_entries();

            for chunk in current.into_chunks() {
                let first = chunk.first_key().unwrap_or_default().to_vec();
                let offset = self.append_node(&chunk)?;
                let at = parent.partition_point(|(k, _)| k < &first);
                parent.insert(at, (first, offset));
            }

            if parent.len() <= 1 {
                let Some((_, new_root)) = parent.first() else {
                    bail!("rebalance produced a parent with no children");
                };
                return Ok(*new_root);
            }

            current_offset = ancestor.map(|(offset, _)| offset).unwrap_or(0);
            current = Node::Interior(parent);
        }
    }

    /// Depth-first post-order copy of the live tree rooted at `offset` from
    /// `reader`'s file into this writer's file, re-parenting child pointers
    /// to their new offsets. Returns the subtree's new root offset.
    pub fn copy_tree(&mut self, reader: &TreeReader, offset: u32) -> Result<u32> {
        self.copy_subtree(reader, offset, 0)
    }

    fn copy_subtree(&mut self, reader: &TreeReader, offset: u32, depth: usize) -> Result<u32> {
        ensure!(
            depth < MAX_TREE_DEPTH,
            "tree deeper than {} levels during compaction",
            MAX_TREE_DEPTH
        );
        let node = reader
            .load(offset)
            .ok_or_else(|| eyre!("unreadable node at offset {offset} during compaction"))?;

        let rewritten = match node.as_ref() {
            Node::Leaf(entries) => Node::Leaf(entries.clone()),
            Node::Interior(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, child) in entries {
                    let new_child = self.copy_subtree(reader, *child, depth + 1)?;
                    out.push((key.clone(), new_child));
                }
                Node::Interior(out)
            }
        };
        self.append_node(&rewritten)
    }
}
