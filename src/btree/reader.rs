//! Read-side lookup over a finished index.
//!
//! A membership query descends from the root, binary-searching each node
//! and following the lower-bound child until the key is found or a leaf
//! runs out of road. The descent reads at most one node per tree level.
//!
//! Per the file-corruption policy, a query that trips over a damaged node
//! logs the failure and answers "not found"; only opening a file with a
//! bad header is a hard error.

use std::path::Path;

use eyre::{ensure, Result};
use tracing::warn;

use super::node::UNUSED;
use super::tree::TreeFile;
use crate::encoding::sha1::Sha1;
use crate::storage::{MmapStorage, ReadStorage};

/// Membership reader over one index file.
#[derive(Debug)]
pub struct Btree<S> {
    tree: TreeFile<S>,
}

impl Btree<MmapStorage> {
    /// Memory-maps an index file for querying.
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(MmapStorage::open(path)?)
    }
}

impl<S: ReadStorage> Btree<S> {
    /// Opens an index over any readable storage device.
    pub fn open(storage: S) -> Result<Self> {
        Ok(Self {
            tree: TreeFile::open(storage)?,
        })
    }

    pub fn order(&self) -> u32 {
        self.tree.order()
    }

    /// Whether the digest is a member of the indexed set.
    pub fn contains(&mut self, sha1: &Sha1) -> bool {
        match self.descend(sha1) {
            Ok(found) => found,
            Err(error) => {
                warn!("treating corrupt index as a miss: {error:#}");
                false
            }
        }
    }

    fn descend(&mut self, sha1: &Sha1) -> Result<bool> {
        let mut ptr = self.tree.root_ptr();

        loop {
            let node = self.tree.read_node(ptr)?;

            if node.contains(sha1) {
                return Ok(true);
            }

            if node.is_leaf {
                return Ok(false);
            }

            ensure!(
                node.keys_count > 0,
                "node {} is corrupt: internal node without keys",
                ptr
            );

            let child = node.pointers[node.lower_bound_child_index(sha1)];
            ensure!(
                child != UNUSED,
                "node {} is corrupt: descent hit a missing child",
                ptr
            );
            ptr = child;
        }
    }
}
