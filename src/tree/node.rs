//! # Node Representation and Codec
//!
//! A node is the unit of persistence: a tagged record holding an ordered
//! byte-string-keyed map. On disk every record is framed with a `u32`
//! big-endian length prefix:
//!
//! ```text
//! [u32 BE length][tag: "kv" | "kp"][varint entry_count][entries...]
//!
//! leaf entry:     [varint key_len][key][varint value_len][value]
//! interior entry: [varint key_len][key][u32 BE child_offset]
//! ```
//!
//! The encoding is deterministic and round-trips exactly. Decoding is
//! strict: unknown tags, truncated bodies, trailing bytes, and entry counts
//! above [`NODE_CAPACITY`] are all rejected, which is how corrupt regions of
//! a file surface as "node not found" instead of undefined behavior.
//!
//! Keys are compared byte-wise throughout. No locale or numeric
//! interpretation is ever applied.

use eyre::{bail, ensure, Result};

use crate::config::{FRAME_PREFIX_LEN, NODE_CAPACITY, NODE_TAG_LEN};
use crate::encoding::{read_varint, write_varint};

pub const TAG_LEAF: [u8; 2] = *b"kv";
pub const TAG_INTERIOR: [u8; 2] = *b"kp";

/// A decoded tree node. Entries are kept sorted byte-wise by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Key → opaque value blob.
    Leaf(Vec<(Vec<u8>, Vec<u8>)>),
    /// Key → child file offset.
    Interior(Vec<(Vec<u8>, u32)>),
}

/// Index of the child to descend into: the rightmost entry whose key is at
/// or below `key`, clamped to the first entry when every key is above it.
pub(crate) fn descend_index<T>(entries: &[(Vec<u8>, T)], key: &[u8]) -> usize {
    let upper = entries.partition_point(|(k, _)| k.as_slice() <= key);
    upper.saturating_sub(1)
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Interior(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_key(&self) -> Option<&[u8]> {
        match self {
            Node::Leaf(entries) => entries.first().map(|(k, _)| k.as_slice()),
            Node::Interior(entries) => entries.first().map(|(k, _)| k.as_slice()),
        }
    }

    /// Looks up `key` in a leaf.
    pub(crate) fn leaf_get(&self, key: &[u8]) -> Option<&[u8]> {
        match self {
            Node::Leaf(entries) => entries
                .binary_search_by(|(k, _)| k.as_slice().cmp(key))
                .ok()
                .map(|i| entries[i].1.as_slice()),
            Node::Interior(_) => None,
        }
    }

    /// Inserts or replaces `key` in a leaf, keeping entries sorted.
    pub(crate) fn upsert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let Node::Leaf(entries) = self else {
            bail!("upsert on an interior node");
        };
        match entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            Ok(i) => entries[i].1 = value.to_vec(),
            Err(i) => entries.insert(i, (key.to_vec(), value.to_vec())),
        }
        Ok(())
    }

    /// Removes `key` from a leaf if present.
    pub(crate) fn delete(&mut self, key: &[u8]) -> Result<()> {
        let Node::Leaf(entries) = self else {
            bail!("delete on an interior node");
        };
        if let Ok(i) = entries.binary_search_by(|(k, _)| k.as_slice().cmp(key)) {
            entries.remove(i);
        }
        Ok(())
    }

    /// Absorbs all entries of `other` into `self`. Both nodes must be the
    /// same variant; the caller re-sorts afterwards.
    pub(crate) fn merge_from(&mut self, other: &Node) -> Result<()> {
        match (self, other) {
            (Node::Leaf(dst), Node::Leaf(src)) => dst.extend(src.iter().cloned()),
            (Node::Interior(dst), Node::Interior(src)) => dst.extend(src.iter().cloned()),
            _ => bail!("sibling node type mismatch during merge"),
        }
        Ok(())
    }

    pub(crate) fn sort_entries(&mut self) {
        match self {
            Node::Leaf(entries) => entries.sort_unstable_by(|a, b| a.0.cmp(&b.0)),
            Node::Interior(entries) => entries.sort_unstable_by(|a, b| a.0.cmp(&b.0)),
        }
    }

    /// Splits an overflowing node into contiguous chunks of at most
    /// [`NODE_CAPACITY`] entries each, sized `ceil(n / ceil(n / capacity))`
    /// so the pieces come out roughly even. A node within capacity is
    /// returned as a single chunk, as is an empty node (the transient state
    /// after deleting the last key with no sibling left to merge).
    pub(crate) fn into_chunks(self) -> Vec<Node> {
        let n = self.len();
        if n <= NODE_CAPACITY {
            return vec![self];
        }
        let chunk_count = n.div_ceil(NODE_CAPACITY);
        let chunk_size = n.div_ceil(chunk_count);
        match self {
            Node::Leaf(entries) => entries
                .chunks(chunk_size)
                .map(|c| Node::Leaf(c.to_vec()))
                .collect(),
            Node::Interior(entries) => entries
                .chunks(chunk_size)
                .map(|c| Node::Interior(c.to_vec()))
                .collect(),
        }
    }

    /// Encodes the node as a complete on-disk frame, length prefix included.
    pub fn encode_framed(&self) -> Result<Vec<u8>> {
        let mut record = Vec::with_capacity(64);
        match self {
            Node::Leaf(entries) => {
                record.extend_from_slice(&TAG_LEAF);
                write_varint(&mut record, entries.len() as u64);
                for (key, value) in entries {
                    write_varint(&mut record, key.len() as u64);
                    record.extend_from_slice(key);
                    write_varint(&mut record, value.len() as u64);
                    record.extend_from_slice(value);
                }
            }
            Node::Interior(entries) => {
                record.extend_from_slice(&TAG_INTERIOR);
                write_varint(&mut record, entries.len() as u64);
                for (key, child) in entries {
                    write_varint(&mut record, key.len() as u64);
                    record.extend_from_slice(key);
                    record.extend_from_slice(&child.to_be_bytes());
                }
            }
        }

        ensure!(
            record.len() <= u32::MAX as usize,
            "node record of {} bytes exceeds the frame length prefix",
            record.len()
        );

        let mut frame = Vec::with_capacity(FRAME_PREFIX_LEN + record.len());
        frame.extend_from_slice(&(record.len() as u32).to_be_bytes());
        frame.extend_from_slice(&record);
        Ok(frame)
    }

    /// Decodes an unframed record (the bytes following the length prefix).
    pub fn decode(record: &[u8]) -> Result<Node> {
        ensure!(
            record.len() >= NODE_TAG_LEN,
            "node record of {} bytes is shorter than its type tag",
            record.len()
        );
        let (tag, body) = record.split_at(NODE_TAG_LEN);

        let mut pos = 0usize;
        let (count, read) = read_varint(body)?;
        pos += read;
        ensure!(
            count as usize <= NODE_CAPACITY,
            "entry count {} exceeds node capacity {}",
            count,
            NODE_CAPACITY
        );

        let node = if tag == TAG_LEAF {
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key = read_slice(body, &mut pos)?.to_vec();
                let value = read_slice(body, &mut pos)?.to_vec();
                entries.push((key, value));
            }
            Node::Leaf(entries)
        } else if tag == TAG_INTERIOR {
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key = read_slice(body, &mut pos)?.to_vec();
                ensure!(pos + 4 <= body.len(), "truncated child offset");
                let child = u32::from_be_bytes(body[pos..pos + 4].try_into().unwrap()); // INVARIANT: bounds checked by ensure above
                pos += 4;
                entries.push((key, child));
            }
            Node::Interior(entries)
        } else {
            bail!("unknown node tag {:?}", tag);
        };

        ensure!(
            pos == body.len(),
            "{} trailing bytes after node record",
            body.len() - pos
        );
        Ok(node)
    }
}

/// Reads a varint-length-prefixed byte slice out of `body` at `*pos`.
fn read_slice<'a>(body: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let (len, read) = read_varint(&body[*pos..])?;
    *pos += read;
    let len = len as usize;
    ensure!(
        *pos + len <= body.len(),
        "truncated entry: {} bytes claimed, {} available",
        len,
        body.len() - *pos
    );
    let slice = &body[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}
