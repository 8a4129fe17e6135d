//! Storage layer implementation
//!
//! Paged table files with per-page checksums, plus the catalog that owns the
//! data directory layout.

pub mod catalog;
pub mod checksum;
pub mod page;
pub mod table_file;

pub use catalog::{validate_identifier, IndexEntry, Storage};
pub use checksum::{Checksum, ChecksumError};
pub use page::{Page, RawRow};
pub use table_file::TableFile;
