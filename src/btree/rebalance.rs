//! Post-load repair of the right spine.
//!
//! The sorted load leaves every sealed node full, but the nodes that were
//! still on the spine when the stream ended can hold fewer than `m` keys,
//! and in the extreme a freshly grown rightmost path is empty all the way
//! down. Repair runs in two passes over the rightmost path only; nothing
//! left of it is ever deficient.
//!
//! **Structure pass.** Descend from the root along rightmost children. An
//! internal node whose rightmost child slot is vacant gets an empty
//! subtree materialized down to leaf depth, so every node with `k` keys
//! has `k + 1` children. Created pointers are tracked so the pass can
//! report how much it had to add.
//!
//! **Key pass.** Top-down along the same path: while the rightmost child
//! holds fewer than `m` keys, rotate through the parent — the separator
//! key drops into the child's front, the left sibling's greatest key
//! replaces the separator, and (below internal nodes) the left sibling's
//! rightmost subtree moves across. Left siblings are sealed full with `2m`
//! keys, so at most `m` rotations are needed and no sibling ever drops
//! below `m`. Keys stay strictly ascending and all leaves stay at the
//! same depth throughout.

use eyre::{ensure, eyre, Result};
use hashbrown::HashSet;
use tracing::debug;

use super::node::{Node, Pointer, UNUSED};
use super::tree::TreeFile;
use crate::storage::Storage;

/// Repairs underfull rightmost nodes after a sorted load.
pub(crate) fn rebalance<S: Storage>(
    tree: &mut TreeFile<S>,
    height: u32,
    next_node_ptr: &mut Pointer,
) -> Result<()> {
    if height <= 1 {
        return Ok(());
    }

    let spine = fulfill_structure(tree, height, next_node_ptr)?;
    redistribute_keys(tree, &spine)
}

/// Descends the rightmost path, materializing any missing children, and
/// returns the path from the root down to the rightmost leaf.
fn fulfill_structure<S: Storage>(
    tree: &mut TreeFile<S>,
    height: u32,
    next_node_ptr: &mut Pointer,
) -> Result<Vec<Pointer>> {
    let mut created: HashSet<Pointer> = HashSet::new();
    let mut spine = Vec::with_capacity(height as usize);

    spine.push(tree.root_ptr());
    let mut node = tree.read_node(tree.root_ptr())?;

    for child_depth in 1..height {
        ensure!(
            !node.is_leaf,
            "node {} is corrupt: leaf above the leaf level",
            node.this
        );

        for index in 0..node.keys_count as usize {
            ensure!(
                node.pointers[index] != UNUSED,
                "node {} is corrupt: child {} of {} is missing",
                node.this,
                index,
                node.keys_count + 1
            );
        }

        if node.rightmost_pointer() == UNUSED {
            materialize_subtree(tree, &mut node, child_depth, height, next_node_ptr, &mut created)?;
        }

        let child_ptr = node.rightmost_pointer();
        spine.push(child_ptr);
        node = tree.read_node(child_ptr)?;
    }

    ensure!(
        node.is_leaf,
        "node {} is corrupt: internal node at the leaf level",
        node.this
    );

    if !created.is_empty() {
        debug!(nodes = created.len(), "materialized missing rightmost children");
    }

    Ok(spine)
}

/// Hangs a chain of empty nodes off `parent`'s vacant rightmost slot,
/// one per level down to leaf depth.
fn materialize_subtree<S: Storage>(
    tree: &mut TreeFile<S>,
    parent: &mut Node,
    child_depth: u32,
    height: u32,
    next_node_ptr: &mut Pointer,
    created: &mut HashSet<Pointer>,
) -> Result<()> {
    let order = tree.order();
    let mut chain: Vec<Node> = Vec::with_capacity((height - child_depth) as usize);

    for depth in child_depth..height {
        let ptr = *next_node_ptr;
        *next_node_ptr += 1;
        created.insert(ptr);

        let parent_ptr = chain.last().map_or(parent.this, |n| n.this);
        let mut child = Node::new(order, parent_ptr);
        child.this = ptr;
        child.is_leaf = depth == height - 1;

        match chain.last_mut() {
            Some(previous) => previous.pointers[0] = ptr,
            None => parent.pointers[parent.keys_count as usize] = ptr,
        }

        chain.push(child);
    }

    tree.write_node(parent)?;
    for node in &chain {
        tree.write_node(node)?;
    }

    Ok(())
}

/// Rotates keys into deficient rightmost nodes, top-down.
fn redistribute_keys<S: Storage>(tree: &mut TreeFile<S>, spine: &[Pointer]) -> Result<()> {
    let min_keys = tree.order();

    for level in 1..spine.len() {
        let mut parent = tree.read_node(spine[level - 1])?;
        let mut node = tree.read_node(spine[level])?;

        if node.keys_count >= min_keys {
            continue;
        }

        let left_ptr = parent
            .child_pointer_prev_of(node.this)
            .ok_or_else(|| eyre!("node {} has no left sibling to borrow from", node.this))?;
        // The separator between the siblings sits at the left child's index.
        let separator_index = parent
            .child_index_of(left_ptr)
            .expect("left sibling was just located in the pointer array");
        let mut left = tree.read_node(left_ptr)?;

        while node.keys_count < min_keys {
            ensure!(
                left.keys_count > min_keys,
                "node {} cannot lend a key without dropping below the minimum fill",
                left.this
            );

            if !node.is_leaf {
                let moved = left.rightmost_pointer();
                node.push_front_child(moved);
                left.pointers[left.keys_count as usize] = UNUSED;

                let mut moved_child = tree.read_node(moved)?;
                moved_child.parent = node.this;
                tree.write_node(&moved_child)?;
            }

            let separator = parent.keys[separator_index];
            node.push_front(&separator);

            parent.keys[separator_index] = left.keys[left.keys_count as usize - 1];
            left.keys_count -= 1;
        }

        tree.write_node(&left)?;
        tree.write_node(&parent)?;
        tree.write_node(&node)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::builder::SortedBuilder;
    use crate::encoding::sha1::Sha1;
    use crate::storage::FileStorage;
    use tempfile::tempdir;

    fn key(n: u8) -> Sha1 {
        let mut key = [0u8; 20];
        key[19] = n;
        key
    }

    fn build(dir: &tempfile::TempDir, order: u32, count: u8) -> TreeFile<FileStorage> {
        let storage = FileStorage::create(dir.path().join("t.btree")).unwrap();
        let mut builder = SortedBuilder::new(storage, order).unwrap();
        for n in 1..=count {
            builder.insert_sorted(&key(n)).unwrap();
        }
        builder.finalize().unwrap();

        TreeFile::open(FileStorage::open(dir.path().join("t.btree")).unwrap()).unwrap()
    }

    #[test]
    fn fresh_rightmost_leaf_borrows_from_its_sibling() {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir, 1, 3);

        // Root split promoted key 3 and left the fresh leaf empty; the
        // rotation must pull it back down and rebalance the leaves.
        let root = tree.read_node(tree.root_ptr()).unwrap();
        assert!(!root.is_leaf);
        assert_eq!(root.keys_count, 1);
        assert_eq!(root.keys[0], key(2));

        let left = tree.read_node(root.pointers[0]).unwrap();
        let right = tree.read_node(root.pointers[1]).unwrap();
        assert_eq!(&left.keys[..1], &[key(1)]);
        assert_eq!(left.keys_count, 1);
        assert_eq!(&right.keys[..1], &[key(3)]);
        assert_eq!(right.keys_count, 1);
    }

    #[test]
    fn every_non_root_node_reaches_minimum_fill() {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir, 1, 9);

        let root_ptr = tree.root_ptr();
        let mut pending = vec![root_ptr];
        while let Some(ptr) = pending.pop() {
            let node = tree.read_node(ptr).unwrap();
            if ptr != root_ptr {
                assert!(node.keys_count >= 1, "node {} is underfull", ptr);
            }
            if !node.is_leaf {
                for index in 0..=node.keys_count as usize {
                    pending.push(node.pointers[index]);
                }
            }
        }
    }

    #[test]
    fn rotated_children_point_back_at_their_new_parent() {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir, 1, 9);

        let root = tree.read_node(tree.root_ptr()).unwrap();
        for index in 0..=root.keys_count as usize {
            let child = tree.read_node(root.pointers[index]).unwrap();
            assert_eq!(child.parent, root.this);

            for grand_index in 0..=child.keys_count as usize {
                let grandchild = tree.read_node(child.pointers[grand_index]).unwrap();
                assert_eq!(grandchild.parent, child.this);
            }
        }
    }

    #[test]
    fn vacant_rightmost_slot_is_materialized_before_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.btree");

        // Hand-craft a two-level tree whose root never had its rightmost
        // child hooked in: root holds key 3 with only a left leaf.
        let mut tree = TreeFile::create(FileStorage::create(&path).unwrap(), 1).unwrap();

        let mut leaf = Node::new(1, 1);
        leaf.this = 0;
        leaf.is_leaf = true;
        leaf.push_back(&key(1));
        leaf.push_back(&key(2));
        tree.write_node(&leaf).unwrap();

        let mut root = Node::new(1, UNUSED);
        root.this = 1;
        root.insert(&key(3));
        root.pointers[0] = 0;
        tree.write_node(&root).unwrap();
        tree.set_root_ptr(1).unwrap();

        let mut next_node_ptr = 2;
        rebalance(&mut tree, 2, &mut next_node_ptr).unwrap();
        assert_eq!(next_node_ptr, 3);

        let root = tree.read_node(1).unwrap();
        assert_eq!(root.keys[0], key(2));

        let created = tree.read_node(root.pointers[1]).unwrap();
        assert!(created.is_leaf);
        assert_eq!(created.keys_count, 1);
        assert_eq!(created.keys[0], key(3));
        assert_eq!(created.parent, 1);

        let left = tree.read_node(root.pointers[0]).unwrap();
        assert_eq!(left.keys_count, 1);
        assert_eq!(left.keys[0], key(1));
    }

    #[test]
    fn already_balanced_tree_is_untouched() {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir, 1, 8);

        // Eight keys of order 1 end the load with the rightmost leaf
        // exactly full, so nothing needs to move.
        let root = tree.read_node(tree.root_ptr()).unwrap();
        assert_eq!(root.keys_count, 2);
        assert_eq!(root.keys[0], key(3));
        assert_eq!(root.keys[1], key(6));

        let rightmost = tree.read_node(root.rightmost_pointer()).unwrap();
        assert_eq!(rightmost.keys_count, 2);
        assert_eq!(rightmost.keys[0], key(7));
        assert_eq!(rightmost.keys[1], key(8));
    }
}
