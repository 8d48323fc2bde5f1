//! Tree base: file header and node addressing over a storage device.
//!
//! The file starts with an 8-byte header (`order`, then `root_ptr`, both
//! little-endian u32) followed by node records in allocation order. Node
//! `k` of a tree of order `m` lives at byte offset `8 + k * (49 + 48m)`.
//!
//! `TreeFile` is the only component that touches raw offsets; the builder,
//! rebalancer and reader all go through `read_node` / `write_node`.

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::node::{Node, Pointer};
use crate::storage::{ReadStorage, Storage};

/// Size of the file header preceding node 0.
pub const HEADER_SIZE: u64 = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct FileHeader {
    order: U32,
    root_ptr: U32,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == HEADER_SIZE as usize);

/// Owns the storage device and the cached header of one index file.
///
/// A single scratch buffer of one node record is reused for every
/// transfer, so steady-state reads and writes allocate nothing.
#[derive(Debug)]
pub struct TreeFile<S> {
    storage: S,
    order: u32,
    root_ptr: Pointer,
    scratch: Vec<u8>,
}

impl<S: ReadStorage> TreeFile<S> {
    /// Opens an existing index and reads its header.
    pub fn open(mut storage: S) -> Result<Self> {
        ensure!(
            storage.len()? >= HEADER_SIZE,
            "malformed header: file is shorter than {} bytes",
            HEADER_SIZE
        );

        let mut buf = [0u8; HEADER_SIZE as usize];
        storage.seek_in(0)?;
        storage.read(&mut buf)?;

        let header = FileHeader::ref_from_bytes(&buf)
            .map_err(|e| eyre::eyre!("malformed header: {:?}", e))?;

        let order = header.order.get();
        ensure!(order > 0, "malformed header: order is zero");

        Ok(Self {
            storage,
            order,
            root_ptr: header.root_ptr.get(),
            scratch: vec![0u8; Node::binary_size(order) as usize],
        })
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn root_ptr(&self) -> Pointer {
        self.root_ptr
    }

    fn node_offset(&self, ptr: Pointer) -> u64 {
        HEADER_SIZE + u64::from(ptr) * self.scratch.len() as u64
    }

    /// Reads the node at `ptr`, verifying the record lies inside the file.
    pub fn read_node(&mut self, ptr: Pointer) -> Result<Node> {
        let offset = self.node_offset(ptr);
        ensure!(
            offset + self.scratch.len() as u64 <= self.storage.len()?,
            "node {} out of range: record ends past end of file",
            ptr
        );

        self.storage.seek_in(offset)?;
        self.storage.read(&mut self.scratch)?;

        Node::read_from(&self.scratch, self.order, ptr)
    }
}

impl<S: Storage> TreeFile<S> {
    /// Creates a fresh index file, writing the header with node 0 as root.
    pub fn create(mut storage: S, order: u32) -> Result<Self> {
        ensure!(order > 0, "tree order must be positive");

        let header = FileHeader {
            order: U32::new(order),
            root_ptr: U32::new(0),
        };
        storage.seek_out(0)?;
        storage.write(header.as_bytes())?;

        Ok(Self {
            storage,
            order,
            root_ptr: 0,
            scratch: vec![0u8; Node::binary_size(order) as usize],
        })
    }

    /// Writes the node record at its computed offset.
    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        node.write_to(&mut self.scratch);

        self.storage.seek_out(self.node_offset(node.this))?;
        self.storage.write(&self.scratch)
    }

    /// Updates the root pointer, both cached and on disk.
    pub fn set_root_ptr(&mut self, ptr: Pointer) -> Result<()> {
        self.root_ptr = ptr;
        self.storage.seek_out(4)?;
        self.storage.write(&ptr.to_le_bytes())
    }

    pub fn sync(&self) -> Result<()> {
        self.storage.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::UNUSED;
    use crate::storage::FileStorage;
    use tempfile::tempdir;

    #[test]
    fn create_writes_order_and_zero_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");

        let tree = TreeFile::create(FileStorage::create(&path).unwrap(), 4).unwrap();
        assert_eq!(tree.order(), 4);
        assert_eq!(tree.root_ptr(), 0);
        drop(tree);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], &[4, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn open_rejects_zero_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");
        std::fs::write(&path, [0u8; 8]).unwrap();

        let result = TreeFile::open(FileStorage::open(&path).unwrap());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("order is zero"));
    }

    #[test]
    fn open_rejects_truncated_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");
        std::fs::write(&path, [1u8, 0, 0]).unwrap();

        let result = TreeFile::open(FileStorage::open(&path).unwrap());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("malformed header"));
    }

    #[test]
    fn node_round_trips_at_computed_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");

        let mut tree = TreeFile::create(FileStorage::create(&path).unwrap(), 2).unwrap();

        let mut node = Node::new(2, UNUSED);
        node.this = 3;
        node.is_leaf = true;
        node.push_back(&[7u8; 20]);
        tree.write_node(&node).unwrap();

        let read = tree.read_node(3).unwrap();
        assert!(read.is_leaf);
        assert_eq!(read.keys_count, 1);
        assert_eq!(read.keys[0], [7u8; 20]);

        // Node 3 of an order-2 tree starts at 8 + 3 * 145.
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, 8 + 4 * Node::binary_size(2));
        assert_eq!(bytes[8 + 3 * 145], 1);
    }

    #[test]
    fn read_node_out_of_range_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");

        let mut tree = TreeFile::create(FileStorage::create(&path).unwrap(), 2).unwrap();
        let result = tree.read_node(0);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("out of range"));
    }

    #[test]
    fn set_root_ptr_rewrites_header_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");

        let mut tree = TreeFile::create(FileStorage::create(&path).unwrap(), 2).unwrap();
        tree.set_root_ptr(9).unwrap();
        assert_eq!(tree.root_ptr(), 9);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[4..8], &[9, 0, 0, 0]);
        assert_eq!(&bytes[0..4], &[2, 0, 0, 0]);
    }
}
