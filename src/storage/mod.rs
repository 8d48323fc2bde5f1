//! # Storage Module
//!
//! This module provides the byte-level storage abstraction the B-tree is
//! built on. The tree never touches the filesystem directly; it talks to a
//! seekable byte device through the traits below, which keeps the index
//! logic testable and lets the read path pick a faster backend than the
//! write path.
//!
//! ## Two Cursors
//!
//! A device keeps **independent read and write cursors**. The builder
//! appends nodes through the write cursor while the rebalancer re-reads
//! earlier nodes through the read cursor, so the two positions must not
//! interfere. Every transfer is explicit: position the cursor, then move
//! bytes. There is no buffering contract; `read` fills the whole buffer or
//! fails.
//!
//! ## Backends
//!
//! | Backend       | Access      | Used by                         |
//! |---------------|-------------|---------------------------------|
//! | `FileStorage` | read+write  | index construction, CLI prepare |
//! | `MmapStorage` | read-only   | query path (`Btree::open_file`) |
//!
//! `FileStorage` wraps a plain `std::fs::File` and seeks before each
//! transfer. `MmapStorage` maps the finished index into the address space
//! so a point lookup costs a handful of page touches instead of
//! seek/read syscalls.
//!
//! ## Trait Split
//!
//! `ReadStorage` is the read half; `Storage` extends it with the write
//! half. The lookup side of the tree only requires `ReadStorage`, which is
//! what allows the read-only mmap backend to exist at the type level
//! instead of erroring at runtime on writes.

mod file;
mod mmap;

pub use file::FileStorage;
pub use mmap::MmapStorage;

use eyre::Result;

/// Read half of a seekable byte device.
pub trait ReadStorage {
    /// Positions the read cursor at an absolute byte offset.
    fn seek_in(&mut self, offset: u64) -> Result<()>;

    /// Reads exactly `buf.len()` bytes at the read cursor and advances it.
    ///
    /// A short read is an error; the caller always knows how many bytes a
    /// record occupies.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Current total length of the device in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Full read/write seekable byte device.
pub trait Storage: ReadStorage {
    /// Positions the write cursor at an absolute byte offset.
    fn seek_out(&mut self, offset: u64) -> Result<()>;

    /// Writes all of `buf` at the write cursor and advances it.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> Result<()>;
}
