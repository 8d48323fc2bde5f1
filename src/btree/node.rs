//! B-tree node record and its in-memory operations.
//!
//! A node of order `m` occupies exactly `49 + 48m` bytes on disk:
//!
//! ```text
//! Offset            Size       Description
//! 0                 1          is_leaf flag (0 or 1)
//! 1                 4          keys_count, little-endian
//! 5                 4*(2m+1)   child pointers, little-endian u32 each
//! 5+4*(2m+1)        20*2m      keys, raw SHA-1 bytes
//! 9+48m             4          parent pointer, little-endian
//! 13+48m            36         reserved, zero-filled
//! ```
//!
//! Pointer slots past the live children and the parent slot of the root
//! carry the `UNUSED` sentinel. Key slots past `keys_count` are left as
//! written; readers never look at them.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::encoding::sha1::{Sha1, SHA1_BINARY_LENGTH};

/// Index of a node within the file; node `k` starts at `8 + k * size`.
pub type Pointer = u32;

/// Sentinel for "no child" / "no parent".
pub const UNUSED: Pointer = u32::MAX;

const POINTER_SIZE: usize = 4;

/// Zero-filled tail reserved for format extensions (checksums, flags).
const NODE_RESERVED_SIZE: usize = 36;

/// Fixed prelude shared by every node record.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodePrelude {
    is_leaf: u8,
    keys_count: U32,
}

const NODE_PRELUDE_SIZE: usize = 5;

const _: () = assert!(std::mem::size_of::<NodePrelude>() == NODE_PRELUDE_SIZE);

/// One B-tree node, held fully in memory.
///
/// The pointer and key vectors are allocated at full capacity up front and
/// never resized; `keys_count` tracks the live prefix, mirroring the
/// on-disk representation.
#[derive(Debug, Clone)]
pub struct Node {
    pub this: Pointer,
    pub parent: Pointer,
    pub is_leaf: bool,
    pub keys_count: u32,
    pub pointers: Vec<Pointer>,
    pub keys: Vec<Sha1>,
    order: u32,
}

impl Node {
    /// Creates an empty leafless node of the given order.
    pub fn new(order: u32, parent: Pointer) -> Self {
        let max_keys = 2 * order as usize;

        Self {
            this: UNUSED,
            parent,
            is_leaf: false,
            keys_count: 0,
            pointers: vec![UNUSED; max_keys + 1],
            keys: vec![[0u8; SHA1_BINARY_LENGTH]; max_keys],
            order,
        }
    }

    /// On-disk size in bytes of a node of the given order: `49 + 48m`.
    pub fn binary_size(order: u32) -> u64 {
        let order = order as u64;
        NODE_PRELUDE_SIZE as u64
            + POINTER_SIZE as u64 * (2 * order + 1)
            + SHA1_BINARY_LENGTH as u64 * 2 * order
            + POINTER_SIZE as u64
            + NODE_RESERVED_SIZE as u64
    }

    pub fn max_keys(&self) -> u32 {
        2 * self.order
    }

    pub fn is_full(&self) -> bool {
        self.keys_count == self.max_keys()
    }

    /// Appends a key known to be greater than every key already present.
    pub fn push_back(&mut self, key: &Sha1) {
        debug_assert!(!self.is_full());
        debug_assert!(self.keys_count == 0 || self.keys[self.keys_count as usize - 1] < *key);

        self.keys[self.keys_count as usize] = *key;
        self.keys_count += 1;
    }

    /// Inserts a key at its sorted position, shifting greater keys right.
    ///
    /// Child pointers are not touched; the caller wires any new child
    /// afterwards.
    pub fn insert(&mut self, key: &Sha1) {
        debug_assert!(!self.is_full());

        let live = self.keys_count as usize;
        let position = match self.keys[..live].binary_search(key) {
            Ok(position) | Err(position) => position,
        };

        self.keys.copy_within(position..live, position + 1);
        self.keys[position] = *key;
        self.keys_count += 1;
    }

    /// Prepends a key known to be smaller than every key already present.
    pub fn push_front(&mut self, key: &Sha1) {
        debug_assert!(!self.is_full());
        debug_assert!(self.keys_count == 0 || *key < self.keys[0]);

        let live = self.keys_count as usize;
        self.keys.copy_within(0..live, 1);
        self.keys[0] = *key;
        self.keys_count += 1;
    }

    /// Prepends a child pointer, shifting the live children right.
    pub fn push_front_child(&mut self, child: Pointer) {
        let live_children = self.keys_count as usize + 1;
        debug_assert!(live_children < self.pointers.len());

        self.pointers.copy_within(0..live_children, 1);
        self.pointers[0] = child;
    }

    /// The child greater than all keys in this node.
    pub fn rightmost_pointer(&self) -> Pointer {
        self.pointers[self.keys_count as usize]
    }

    /// Position of `child` in the pointer array, if present.
    pub fn child_index_of(&self, child: Pointer) -> Option<usize> {
        self.pointers[..=self.keys_count as usize]
            .iter()
            .position(|&p| p == child)
    }

    /// The child immediately left of `child`, or `None` if `child` is the
    /// first child (or absent).
    pub fn child_pointer_prev_of(&self, child: Pointer) -> Option<Pointer> {
        match self.child_index_of(child)? {
            0 => None,
            index => Some(self.pointers[index - 1]),
        }
    }

    /// Whether the key is present in this node.
    pub fn contains(&self, key: &Sha1) -> bool {
        self.keys[..self.keys_count as usize].binary_search(key).is_ok()
    }

    /// Index of the child to descend into when looking up `key`.
    pub fn lower_bound_child_index(&self, key: &Sha1) -> usize {
        match self.keys[..self.keys_count as usize].binary_search(key) {
            Ok(position) | Err(position) => position,
        }
    }

    /// Decodes a node of the given order from its on-disk record.
    pub fn read_from(buf: &[u8], order: u32, this: Pointer) -> Result<Self> {
        debug_assert_eq!(buf.len() as u64, Self::binary_size(order));

        let prelude = NodePrelude::ref_from_bytes(&buf[..NODE_PRELUDE_SIZE])
            .map_err(|e| eyre::eyre!("failed to decode node {} prelude: {:?}", this, e))?;

        ensure!(
            prelude.is_leaf <= 1,
            "node {} is corrupt: is_leaf byte is {}",
            this,
            prelude.is_leaf
        );

        let keys_count = prelude.keys_count.get();
        ensure!(
            keys_count <= 2 * order,
            "node {} is corrupt: {} keys exceeds capacity {}",
            this,
            keys_count,
            2 * order
        );

        let mut node = Self::new(order, UNUSED);
        node.this = this;
        node.is_leaf = prelude.is_leaf == 1;
        node.keys_count = keys_count;

        let mut offset = NODE_PRELUDE_SIZE;
        for pointer in node.pointers.iter_mut() {
            *pointer = u32::from_le_bytes(buf[offset..offset + POINTER_SIZE].try_into().unwrap());
            offset += POINTER_SIZE;
        }

        for key in node.keys.iter_mut() {
            key.copy_from_slice(&buf[offset..offset + SHA1_BINARY_LENGTH]);
            offset += SHA1_BINARY_LENGTH;
        }

        node.parent = u32::from_le_bytes(buf[offset..offset + POINTER_SIZE].try_into().unwrap());

        Ok(node)
    }

    /// Encodes this node into its on-disk record.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len() as u64, Self::binary_size(self.order));

        let prelude = NodePrelude {
            is_leaf: self.is_leaf as u8,
            keys_count: U32::new(self.keys_count),
        };
        buf[..NODE_PRELUDE_SIZE].copy_from_slice(prelude.as_bytes());

        let mut offset = NODE_PRELUDE_SIZE;
        for pointer in &self.pointers {
            buf[offset..offset + POINTER_SIZE].copy_from_slice(&pointer.to_le_bytes());
            offset += POINTER_SIZE;
        }

        for key in &self.keys {
            buf[offset..offset + SHA1_BINARY_LENGTH].copy_from_slice(key);
            offset += SHA1_BINARY_LENGTH;
        }

        buf[offset..offset + POINTER_SIZE].copy_from_slice(&self.parent.to_le_bytes());
        offset += POINTER_SIZE;

        buf[offset..].fill(0);
    }
}
