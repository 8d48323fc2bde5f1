//! Read-only memory-mapped storage device.
//!
//! A finished index is immutable, which makes it a good fit for `mmap`:
//! the whole file is mapped once and a lookup descends the tree with plain
//! slice copies instead of seek/read syscalls per node. The OS page cache
//! keeps hot nodes (the root and the first levels) resident across
//! queries.

use std::fs::File;
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use memmap2::Mmap;

use super::ReadStorage;

#[derive(Debug)]
pub struct MmapStorage {
    mmap: Mmap,
    read_pos: u64,
}

impl MmapStorage {
    /// Maps an existing index file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;

        // SAFETY: Mmap::map is unsafe because the mapping becomes stale if
        // the file is modified externally. This is safe because:
        // 1. The index is write-once; nothing mutates it after finalize.
        // 2. The mapping is read-only and its lifetime is tied to
        //    MmapStorage, preventing use-after-unmap.
        // 3. All access goes through read(), which bounds-checks against
        //    the mapped length.
        let mmap = unsafe {
            Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        Ok(Self { mmap, read_pos: 0 })
    }
}

impl ReadStorage for MmapStorage {
    fn seek_in(&mut self, offset: u64) -> Result<()> {
        self.read_pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.read_pos as usize;
        let end = start + buf.len();

        ensure!(
            end <= self.mmap.len(),
            "read of {} bytes at offset {} runs past end of file (len={})",
            buf.len(),
            start,
            self.mmap.len()
        );

        buf.copy_from_slice(&self.mmap[start..end]);
        self.read_pos = end as u64;

        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.mmap.len() as u64)
    }
}
