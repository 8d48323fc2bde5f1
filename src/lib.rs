//! # okon — membership queries over huge SHA-1 corpora
//!
//! okon answers one question fast: *is this SHA-1 digest in the set?*
//! The set — typically a breached-password corpus of around a billion
//! digests — is compiled once from its sorted text distribution into a
//! disk-resident B-tree, and queries then touch `O(log N)` nodes of that
//! file without ever loading it into memory.
//!
//! ## Quick Start
//!
//! ```ignore
//! use okon::{prepare_file, Btree, text_to_sha1};
//!
//! // One-time: compile the corpus into ./data/okon.btree
//! prepare_file("pwned-passwords-sha1.txt", "./data", 1024)?;
//!
//! // Per query: memory-map the index and descend.
//! let mut index = Btree::open_file("./data/okon.btree")?;
//! let digest = text_to_sha1("CBFDAC6008F9CAB4083784CBD1874F76618D2A97")?;
//! if index.contains(&digest) {
//!     println!("breached");
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │   CLI (bin/okon)     │   C ABI (capi)     │
//! ├───────────────────────────────────────────┤
//! │ preparer: text corpus -> sorted digests   │
//! ├───────────────────────────────────────────┤
//! │ btree: bulk loader · rebalancer · reader  │
//! ├───────────────────────────────────────────┤
//! │ storage: file device │ read-only mmap     │
//! └───────────────────────────────────────────┘
//! ```
//!
//! The index is write-once, read-many: no deletes, no updates, no
//! concurrent writers. Concurrent readers are safe because each query
//! owns its own file handle and the file never changes.
//!
//! ## Module Overview
//!
//! - [`btree`]: on-disk node layout, single-pass bulk loading, lookup
//! - [`encoding`]: SHA-1 digest type and hex codec
//! - [`preparer`]: corpus parsing and index construction
//! - [`storage`]: seekable byte-device abstraction (file and mmap)
//! - [`capi`]: C-callable `okon_prepare` / `okon_exists_*`

pub mod btree;
pub mod capi;
pub mod encoding;
pub mod preparer;
pub mod storage;

pub use btree::{Btree, BuildSummary, SortedBuilder};
pub use encoding::{sha1_to_text, text_to_sha1, Sha1};
pub use preparer::{prepare_file, PrepareSummary, DEFAULT_ORDER, INDEX_FILE_NAME};
