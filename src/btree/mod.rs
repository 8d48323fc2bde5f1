//! # On-Disk B-Tree
//!
//! This module implements the disk-resident B-tree behind okon's index
//! files: a write-once, read-many structure answering membership queries
//! over sorted SHA-1 corpora without loading them into memory.
//!
//! ## File Format
//!
//! ```text
//! +--------------------+
//! | order     (4B, LE) |  node capacity parameter m
//! | root_ptr  (4B, LE) |  index of the root node
//! +--------------------+
//! | node 0             |  each node is exactly 49 + 48m bytes
//! | node 1             |
//! | ...                |
//! +--------------------+
//! ```
//!
//! Nodes are laid out in **allocation order**, not tree order; node `k`
//! starts at byte `8 + k * (49 + 48m)`. A node of order `m` holds up to
//! `2m` keys and `2m + 1` children. Pointers are 32-bit node indices with
//! all-ones as the "no child / no parent" sentinel. All multi-byte
//! integers are little-endian regardless of host byte order.
//!
//! ## Construction
//!
//! The index is bulk-loaded in a single pass over a pre-sorted key
//! stream:
//!
//! ```text
//!            sorted digests
//!                  |
//!                  v
//!        SortedBuilder::insert_sorted      appends along the right spine,
//!                  |                       sealing full nodes to disk
//!                  v
//!        SortedBuilder::finalize           flushes the spine, then
//!                  |                       rebalances the rightmost path
//!                  v
//!             okon.btree
//! ```
//!
//! Only the right spine (root to rightmost leaf) is mutable during the
//! load, so memory stays at O(tree height) regardless of corpus size.
//! After the stream ends, the spine's nodes may sit below the B-tree
//! minimum fill; the rebalancer rotates keys in from their sealed left
//! siblings to restore it.
//!
//! ## Querying
//!
//! [`Btree::contains`] descends from the root with a binary search per
//! node, reading at most `height` nodes — `O(log N)` node reads per
//! query. The reader does not support insertion; the format has no free
//! list and nodes are never moved or reclaimed.

pub mod builder;
pub mod node;
pub mod reader;
mod rebalance;
pub mod tree;

pub use builder::{BuildSummary, SortedBuilder};
pub use node::{Node, Pointer, UNUSED};
pub use reader::Btree;
pub use tree::TreeFile;
