//! Fixed-capacity slotted pages
//!
//! ## Payload layout
//! ```text
//! [row][RS][row][RS]...[BLANK][BLANK]...[BLANK]   (exactly `capacity` bytes)
//! row = value[US]value[US]...value
//! value = UTF-8 text | EMPTY
//! ```
//! ## Frame layout (on disk)
//! ```text
//! [id: u32 LE][crc32(payload): u32 LE][payload]
//! ```
use super::checksum::Checksum;
use crate::error::{Result, StorageError};

/// Padding byte filling unused payload
pub const BLANK: u8 = 0x00;

/// Terminates every row
pub const ROW_SEPARATOR: u8 = 0x1E;

/// Separates values within a row
pub const FIELD_SEPARATOR: u8 = 0x1F;

/// Stands for a missing value (distinct from the empty string)
pub const EMPTY_VALUE: u8 = 0x1A;

/// Bytes before the payload in a frame
pub const FRAME_HEADER_SIZE: usize = 8;

const RESERVED: [u8; 4] = [BLANK, ROW_SEPARATOR, FIELD_SEPARATOR, EMPTY_VALUE];

/// Raw row values in schema order
pub type RawRow = Vec<Option<String>>;

/// A page: 1-based id, payload buffer and the checksum of that buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: u32,
    checksum: u32,
    payload: Vec<u8>,
}

impl Page {
    /// A page holding no rows
    pub fn new(id: u32, capacity: usize) -> Self {
        let payload = vec![BLANK; capacity];
        Self {
            id,
            checksum: Checksum::compute(&payload),
            payload,
        }
    }

    /// Build a page from already-encoded rows, in order
    pub fn from_encoded_rows<'a, I>(id: u32, capacity: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut page = Self::new(id, capacity);
        for row in rows {
            page.push_row(row)?;
        }
        Ok(page)
    }

    /// Serialize one row. Values may not contain the reserved separator bytes.
    pub fn encode_row(values: &[Option<String>]) -> Result<Vec<u8>> {
        let mut encoded = Vec::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                encoded.push(FIELD_SEPARATOR);
            }
            match value {
                Some(text) => {
                    if text.bytes().any(|b| RESERVED.contains(&b)) {
                        return Err(StorageError::semantic(format!(
                            "Value {:?} contains a reserved control character",
                            text
                        )));
                    }
                    encoded.extend_from_slice(text.as_bytes());
                }
                None => encoded.push(EMPTY_VALUE),
            }
        }
        encoded.push(ROW_SEPARATOR);
        Ok(encoded)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn capacity(&self) -> usize {
        self.payload.len()
    }

    /// Free bytes, counted as blank cells
    pub fn remaining_capacity(&self) -> usize {
        self.payload.iter().filter(|&&b| b == BLANK).count()
    }

    fn used(&self) -> usize {
        self.capacity() - self.remaining_capacity()
    }

    pub fn fits(&self, encoded_row: &[u8]) -> bool {
        encoded_row.len() <= self.remaining_capacity()
    }

    /// Append an encoded row after the last stored row
    pub fn push_row(&mut self, encoded_row: &[u8]) -> Result<()> {
        if !self.fits(encoded_row) {
            return Err(StorageError::semantic(format!(
                "Row of {} bytes does not fit page {} ({} bytes free)",
                encoded_row.len(),
                self.id,
                self.remaining_capacity()
            )));
        }
        let start = self.used();
        self.payload[start..start + encoded_row.len()].copy_from_slice(encoded_row);
        self.checksum = Checksum::compute(&self.payload);
        Ok(())
    }

    /// Decode every stored row
    pub fn rows(&self) -> Result<Vec<RawRow>> {
        let content: Vec<u8> = self.payload.iter().copied().filter(|&b| b != BLANK).collect();
        if content.is_empty() {
            return Ok(Vec::new());
        }
        if content.last() != Some(&ROW_SEPARATOR) {
            return Err(StorageError::Corruption(format!(
                "Page {} payload does not end on a row boundary",
                self.id
            )));
        }

        let body = &content[..content.len() - 1];
        body.split(|&b| b == ROW_SEPARATOR)
            .map(|row| self.decode_row(row))
            .collect()
    }

    fn decode_row(&self, row: &[u8]) -> Result<RawRow> {
        row.split(|&b| b == FIELD_SEPARATOR)
            .map(|value| {
                if value == [EMPTY_VALUE] {
                    return Ok(None);
                }
                String::from_utf8(value.to_vec()).map(Some).map_err(|_| {
                    StorageError::Corruption(format!("Page {} holds a non UTF-8 value", self.id))
                })
            })
            .collect()
    }

    /// Frame for disk: header followed by the payload
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        frame.extend_from_slice(&self.id.to_le_bytes());
        frame.extend_from_slice(&self.checksum.to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }

    /// Decode and verify a frame read from disk
    pub fn from_frame(frame: &[u8], capacity: usize) -> Result<Self> {
        if frame.len() != FRAME_HEADER_SIZE + capacity {
            return Err(StorageError::Corruption(format!(
                "Page frame is {} bytes, expected {}",
                frame.len(),
                FRAME_HEADER_SIZE + capacity
            )));
        }

        let id = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let checksum = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let payload = frame[FRAME_HEADER_SIZE..].to_vec();

        Checksum::verify(&payload, checksum)
            .map_err(|e| StorageError::Corruption(format!("Page {}: {}", id, e)))?;

        Ok(Self { id, checksum, payload })
    }
}
