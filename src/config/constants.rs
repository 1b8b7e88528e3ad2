//! # Engine Constants
//!
//! All values that shape the on-disk format or the engine's memory footprint
//! live here, with their interdependencies documented and enforced through
//! compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! NODE_CAPACITY (16)
//!       │
//!       └─> NODE_MIN_FILL (8, exactly half)
//!             A node at or below the fill floor merges with a sibling
//!             during the rebalance climb. The floor must stay at half
//!             capacity so a merge of two minimal nodes never produces
//!             more than one overflow split.
//!
//! FOOTER_MAGIC (6 bytes)
//!       │
//!       └─> FOOTER_LEN (4-byte root offset + magic)
//!
//! SCAN_STRIDE (128)
//!       │
//!       └─> SCAN_WINDOW (256, exactly two strides)
//!             Recovery windows must overlap by a full stride so a footer
//!             tag straddling one window boundary lands intact inside the
//!             neighboring window.
//! ```
//!
//! ## File Format Stability
//!
//! `NODE_CAPACITY`, `NODE_TAG_LEN`, `FRAME_PREFIX_LEN`, and `FOOTER_MAGIC`
//! define the file format. Changing any of them invalidates every existing
//! store file.

/// Maximum number of entries a node may hold. This is the tree's branching
/// factor and a hard file-format constant.
pub const NODE_CAPACITY: usize = 16;

/// Fill floor: a node with this many entries or fewer is merged with an
/// immediate sibling while climbing during a mutation.
pub const NODE_MIN_FILL: usize = NODE_CAPACITY / 2;

/// Maximum number of decoded nodes held by a store's private cache.
pub const CACHE_CAPACITY: usize = 64;

/// Byte length of the `u32` big-endian length prefix framing each record.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Byte length of the node type tag (`b"kv"` or `b"kp"`).
pub const NODE_TAG_LEN: usize = 2;

/// Tag that terminates a footer record. The leading 0xFF byte cannot occur
/// at that position inside a well-formed node record's tag, which keeps the
/// backward recovery scan from matching node payload bytes by accident more
/// often than the position check already rules out.
pub const FOOTER_MAGIC: [u8; 6] = *b"\xffbtree";

/// Total footer size: 4-byte big-endian root offset plus the magic tag.
pub const FOOTER_LEN: usize = 4 + FOOTER_MAGIC.len();

/// Backward step between recovery scan windows.
pub const SCAN_STRIDE: usize = 128;

/// Size of each recovery scan window.
pub const SCAN_WINDOW: usize = 256;

/// Upper bound on tree depth accepted during descent. A well-formed tree
/// with branching factor 16 stays far below this; the bound exists so a
/// corrupt file with a pointer cycle terminates instead of spinning.
pub const MAX_TREE_DEPTH: usize = 64;

/// Practical file size ceiling. Child pointers and the footer root offset
/// are 32-bit, so the engine refuses files that could push a record past
/// the 2 GiB line.
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

const _: () = assert!(NODE_MIN_FILL * 2 == NODE_CAPACITY);
const _: () = assert!(SCAN_WINDOW == SCAN_STRIDE * 2);
const _: () = assert!(FOOTER_LEN == 10);
const _: () = assert!(MAX_FILE_SIZE <= u32::MAX as u64 + 1);
