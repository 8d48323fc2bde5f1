//! Sorted-stream bulk loader.
//!
//! The builder consumes a strictly increasing key stream and grows the
//! tree along its **right spine** only: the path from the root to the
//! rightmost leaf, held in memory as a stack of owned nodes. Every node
//! that falls off the spine is full, written out once, and never touched
//! again until the rebalance pass.
//!
//! ## Split-and-grow
//!
//! A key that does not fit in the active leaf seals it and climbs the
//! spine:
//!
//! ```text
//! 1. Write the spine top to disk and pop it.
//! 2. If the spine emptied, the root itself was full: allocate a new
//!    root holding the overflowing key, hang the old root off its first
//!    child slot, and bump the tree height.
//! 3. Otherwise the new spine top is the parent. If it is also full,
//!    climb again. If not, the overflowing key becomes its largest key.
//! 4. Rebuild an empty rightmost path (one fresh node per descended
//!    level) down to a new active leaf.
//! ```
//!
//! Because keys arrive in order, a promoted key is always the largest in
//! the node that absorbs it, and every sealed node holds exactly `2m`
//! keys. The nodes still on the spine when the stream ends may hold fewer
//! than `m`; `finalize` hands them to the rebalancer.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use super::node::{Node, Pointer, UNUSED};
use super::rebalance::rebalance;
use super::tree::TreeFile;
use crate::encoding::sha1::Sha1;
use crate::encoding::sha1_to_text;
use crate::storage::Storage;

/// Statistics reported by a finished build.
#[derive(Debug, Clone, Copy)]
pub struct BuildSummary {
    pub keys: u64,
    pub nodes: u64,
    pub height: u32,
}

/// Builds an index file from a strictly increasing stream of digests.
pub struct SortedBuilder<S: Storage> {
    tree: TreeFile<S>,
    spine: SmallVec<[Node; 8]>,
    next_node_ptr: Pointer,
    height: u32,
    last_key: Option<Sha1>,
    keys_inserted: u64,
}

impl<S: Storage> SortedBuilder<S> {
    /// Creates a fresh index of the given order on `storage`.
    ///
    /// Node 0 starts out as a leaf that is also the root.
    pub fn new(storage: S, order: u32) -> Result<Self> {
        let tree = TreeFile::create(storage, order)?;

        let mut builder = Self {
            tree,
            spine: SmallVec::new(),
            next_node_ptr: 0,
            height: 1,
            last_key: None,
            keys_inserted: 0,
        };

        let mut root = Node::new(order, UNUSED);
        root.this = builder.new_node_pointer();
        root.is_leaf = true;
        builder.spine.push(root);

        Ok(builder)
    }

    /// Inserts the next key of the sorted stream.
    ///
    /// Keys must be strictly increasing; a repeated or out-of-order key is
    /// rejected and leaves the builder unusable.
    pub fn insert_sorted(&mut self, key: &Sha1) -> Result<()> {
        if let Some(last) = &self.last_key {
            ensure!(
                key > last,
                "key {} is not strictly greater than the previous key {}",
                sha1_to_text(key),
                sha1_to_text(last)
            );
        }

        if self.active_node().is_full() {
            self.split_and_grow(key)?;
        } else {
            self.active_node().push_back(key);
        }

        self.last_key = Some(*key);
        self.keys_inserted += 1;

        Ok(())
    }

    /// Flushes the spine, repairs underfull nodes, and syncs the file.
    pub fn finalize(mut self) -> Result<BuildSummary> {
        for node in &self.spine {
            self.tree.write_node(node)?;
        }
        self.spine.clear();

        rebalance(&mut self.tree, self.height, &mut self.next_node_ptr)?;

        self.tree.sync()?;

        Ok(BuildSummary {
            keys: self.keys_inserted,
            nodes: u64::from(self.next_node_ptr),
            height: self.height,
        })
    }

    fn new_node_pointer(&mut self) -> Pointer {
        let ptr = self.next_node_ptr;
        self.next_node_ptr += 1;
        ptr
    }

    fn active_node(&mut self) -> &mut Node {
        self.spine.last_mut().expect("spine is never empty")
    }

    /// Seals full spine nodes upward until `key` finds a home, then
    /// rebuilds the rightmost path down to a fresh leaf.
    fn split_and_grow(&mut self, key: &Sha1) -> Result<()> {
        let mut level_from_leafs = 0u32;

        loop {
            if self.spine.len() == 1 {
                self.grow_root(key)?;
                break;
            }

            let sealed = self.spine.pop().expect("spine is never empty");
            self.tree.write_node(&sealed)?;

            let parent = self.active_node();
            if parent.is_full() {
                level_from_leafs += 1;
                continue;
            }

            parent.insert(key);
            break;
        }

        self.create_children_till_leaf(level_from_leafs);

        Ok(())
    }

    /// Replaces a full root with a new root holding `key`, with the old
    /// root as its first child.
    fn grow_root(&mut self, key: &Sha1) -> Result<()> {
        let new_root_ptr = self.new_node_pointer();

        let mut old_root = self.spine.pop().expect("spine is never empty");
        let old_root_ptr = old_root.this;
        old_root.parent = new_root_ptr;
        self.tree.write_node(&old_root)?;

        let order = self.tree.order();
        let mut new_root = Node::new(order, UNUSED);
        new_root.this = new_root_ptr;
        new_root.is_leaf = false;
        new_root.insert(key);
        new_root.pointers[0] = old_root_ptr;
        self.spine.push(new_root);

        self.tree.set_root_ptr(new_root_ptr)?;
        self.height += 1;

        Ok(())
    }

    /// Pushes one fresh node per level onto the spine, from
    /// `level_from_leafs` down to a new active leaf. Each node is hooked
    /// into the child slot just past its parent's last key.
    fn create_children_till_leaf(&mut self, level_from_leafs: u32) {
        let order = self.tree.order();

        for level in (0..=level_from_leafs).rev() {
            let ptr = self.new_node_pointer();

            let parent = self.active_node();
            parent.pointers[parent.keys_count as usize] = ptr;
            let parent_ptr = parent.this;

            let mut child = Node::new(order, parent_ptr);
            child.this = ptr;
            child.is_leaf = level == 0;
            self.spine.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::tree::HEADER_SIZE;
    use crate::storage::FileStorage;
    use tempfile::tempdir;

    fn key(n: u8) -> Sha1 {
        let mut key = [0u8; 20];
        key[19] = n;
        key
    }

    fn builder(dir: &tempfile::TempDir, order: u32) -> SortedBuilder<FileStorage> {
        let storage = FileStorage::create(dir.path().join("t.btree")).unwrap();
        SortedBuilder::new(storage, order).unwrap()
    }

    #[test]
    fn empty_stream_leaves_a_single_empty_leaf() {
        let dir = tempdir().unwrap();
        let summary = builder(&dir, 2).finalize().unwrap();

        assert_eq!(summary.keys, 0);
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.height, 1);

        let len = std::fs::metadata(dir.path().join("t.btree")).unwrap().len();
        assert_eq!(len, HEADER_SIZE + Node::binary_size(2));
    }

    #[test]
    fn keys_fitting_the_root_never_split() {
        let dir = tempdir().unwrap();
        let mut builder = builder(&dir, 2);

        for n in 1..=4 {
            builder.insert_sorted(&key(n)).unwrap();
        }
        let summary = builder.finalize().unwrap();

        assert_eq!(summary.keys, 4);
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.height, 1);
    }

    #[test]
    fn overflowing_the_root_grows_the_tree() {
        let dir = tempdir().unwrap();
        let mut builder = builder(&dir, 1);

        for n in 1..=3 {
            builder.insert_sorted(&key(n)).unwrap();
        }
        let summary = builder.finalize().unwrap();

        // Old root, new root, and one fresh leaf.
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.height, 2);
    }

    #[test]
    fn rejects_repeated_key() {
        let dir = tempdir().unwrap();
        let mut builder = builder(&dir, 2);

        builder.insert_sorted(&key(5)).unwrap();
        let result = builder.insert_sorted(&key(5));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not strictly greater"));
    }

    #[test]
    fn rejects_decreasing_key() {
        let dir = tempdir().unwrap();
        let mut builder = builder(&dir, 2);

        builder.insert_sorted(&key(5)).unwrap();
        assert!(builder.insert_sorted(&key(4)).is_err());
    }

    #[test]
    fn sealed_nodes_are_full() {
        let dir = tempdir().unwrap();
        let mut b = builder(&dir, 1);

        for n in 1..=9 {
            b.insert_sorted(&key(n)).unwrap();
        }
        let summary = b.finalize().unwrap();
        assert_eq!(summary.height, 3);

        // Every node sealed during the load (node 0 and node 2, the two
        // leaves filled before their splits) holds exactly 2 keys before
        // rebalancing redistributes; after rebalancing nothing exceeds 2.
        let storage = FileStorage::open(dir.path().join("t.btree")).unwrap();
        let mut tree = TreeFile::open(storage).unwrap();
        for ptr in 0..summary.nodes as u32 {
            let node = tree.read_node(ptr).unwrap();
            assert!(node.keys_count <= 2);
        }
    }
}
