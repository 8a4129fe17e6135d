//! Paged table data file
//!
//! ```text
//! [Header: 16 bytes][Frame 1][Frame 2]...[Frame n]
//! Header = magic "PGDT" | version u32 | page_capacity u32 | reserved u32
//! Frame k starts at HEADER_SIZE + (k - 1) * frame_size
//! ```
//! Pages are a flat fixed-stride array: no free list, no compaction, the
//! page count only grows.
use super::page::{Page, FRAME_HEADER_SIZE};
use crate::config::DurabilityLevel;
use crate::error::{Result, StorageError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Bytes before the first frame
pub const HEADER_SIZE: usize = 16;

/// Magic number for table data files (ASCII "PGDT")
const TABLE_MAGIC: [u8; 4] = *b"PGDT";

/// Current data file format version
const TABLE_VERSION: u32 = 1;

/// Open handle on one table's data file
pub struct TableFile {
    file: File,
    path: PathBuf,
    page_capacity: usize,
    page_count: u32,
    durability: DurabilityLevel,
}

impl TableFile {
    /// Create a data file holding a single empty page (id 1). Fails if the file exists.
    pub fn create(path: &Path, page_capacity: usize, durability: DurabilityLevel) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut header = [0u8; HEADER_SIZE];
        header[0..4].copy_from_slice(&TABLE_MAGIC);
        header[4..8].copy_from_slice(&TABLE_VERSION.to_le_bytes());
        header[8..12].copy_from_slice(&(page_capacity as u32).to_le_bytes());

        let mut table_file = Self {
            file,
            path: path.to_path_buf(),
            page_capacity,
            page_count: 0,
            durability,
        };
        table_file.file.write_all(&header)?;
        table_file.write_page(&Page::new(1, page_capacity))?;
        Ok(table_file)
    }

    /// Open an existing data file and validate its header and length
    pub fn open(path: &Path, durability: DurabilityLevel) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header = [0u8; HEADER_SIZE];
        file.read_exact(&mut header).map_err(|_| {
            StorageError::Corruption(format!("{}: data file header is truncated", path.display()))
        })?;

        if header[0..4] != TABLE_MAGIC {
            return Err(StorageError::Corruption(format!(
                "{}: invalid data file magic number",
                path.display()
            )));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != TABLE_VERSION {
            return Err(StorageError::Corruption(format!(
                "{}: unsupported data file version {}",
                path.display(),
                version
            )));
        }
        let page_capacity = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        if page_capacity == 0 {
            return Err(StorageError::Corruption(format!("{}: page capacity is zero", path.display())));
        }

        let frame_size = (FRAME_HEADER_SIZE + page_capacity) as u64;
        let body = file.metadata()?.len().saturating_sub(HEADER_SIZE as u64);
        if body % frame_size != 0 {
            return Err(StorageError::Corruption(format!(
                "{}: data file ends inside a page frame",
                path.display()
            )));
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_capacity,
            page_count: (body / frame_size) as u32,
            durability,
        })
    }

    pub fn page_capacity(&self) -> usize {
        self.page_capacity
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn frame_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.page_capacity
    }

    fn offset(&self, id: u32) -> u64 {
        HEADER_SIZE as u64 + (id as u64 - 1) * self.frame_size() as u64
    }

    /// Read and verify page `id`
    pub fn read_page(&mut self, id: u32) -> Result<Page> {
        if id == 0 || id > self.page_count {
            return Err(StorageError::InvalidArgument(format!(
                "Page {} out of range (table has {} pages)",
                id, self.page_count
            )));
        }

        let mut frame = vec![0u8; self.frame_size()];
        self.file.seek(SeekFrom::Start(self.offset(id)))?;
        self.file.read_exact(&mut frame)?;

        let page = Page::from_frame(&frame, self.page_capacity).map_err(|e| {
            tracing::warn!(file = %self.path.display(), page = id, "page failed verification");
            e
        })?;
        if page.id() != id {
            return Err(StorageError::Corruption(format!(
                "Frame {} of {} carries page id {}",
                id,
                self.path.display(),
                page.id()
            )));
        }

        tracing::trace!(page = id, "read page");
        Ok(page)
    }

    /// Overwrite page `page.id()` in place, or append it when it is the next id
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        let id = page.id();
        if id == 0 || id > self.page_count + 1 {
            return Err(StorageError::InvalidArgument(format!(
                "Cannot write page {} (table has {} pages)",
                id, self.page_count
            )));
        }
        if page.capacity() != self.page_capacity {
            return Err(StorageError::InvalidArgument(format!(
                "Page capacity {} does not match file capacity {}",
                page.capacity(),
                self.page_capacity
            )));
        }

        self.file.seek(SeekFrom::Start(self.offset(id)))?;
        self.file.write_all(&page.to_frame())?;
        if self.durability.requires_immediate_sync() {
            self.file.sync_data()?;
        }

        if id == self.page_count + 1 {
            self.page_count += 1;
        }
        tracing::trace!(page = id, "wrote page");
        Ok(())
    }
}
