//! File-backed storage device.
//!
//! Wraps a single `std::fs::File` while exposing the independent
//! read/write cursor contract. The OS file handle has one position, so the
//! device tracks both logical cursors itself and seeks before every
//! transfer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{Result, WrapErr};

use super::{ReadStorage, Storage};

#[derive(Debug)]
pub struct FileStorage {
    file: File,
    read_pos: u64,
    write_pos: u64,
}

impl FileStorage {
    /// Creates (or truncates) a file for index construction.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create index file '{}'", path.display()))?;

        Ok(Self {
            file,
            read_pos: 0,
            write_pos: 0,
        })
    }

    /// Opens an existing file read-only for querying.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;

        Ok(Self {
            file,
            read_pos: 0,
            write_pos: 0,
        })
    }
}

impl ReadStorage for FileStorage {
    fn seek_in(&mut self, offset: u64) -> Result<()> {
        self.read_pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.read_pos))
            .wrap_err_with(|| format!("failed to seek to offset {}", self.read_pos))?;
        self.file
            .read_exact(buf)
            .wrap_err_with(|| format!("short read of {} bytes at offset {}", buf.len(), self.read_pos))?;
        self.read_pos += buf.len() as u64;

        Ok(())
    }

    fn len(&self) -> Result<u64> {
        let metadata = self.file.metadata().wrap_err("failed to stat index file")?;
        Ok(metadata.len())
    }
}

impl Storage for FileStorage {
    fn seek_out(&mut self, offset: u64) -> Result<()> {
        self.write_pos = offset;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.write_pos))
            .wrap_err_with(|| format!("failed to seek to offset {}", self.write_pos))?;
        self.file
            .write_all(buf)
            .wrap_err_with(|| format!("failed to write {} bytes at offset {}", buf.len(), self.write_pos))?;
        self.write_pos += buf.len() as u64;

        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all().wrap_err("failed to sync index file")
    }
}
