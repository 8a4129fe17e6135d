//! Engine configuration and durability levels
//!
//! A `DBConfig` is fixed for the lifetime of a `Database`. The page capacity only
//! applies to tables created under it; existing data files record their own capacity
//! in the file header.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default payload bytes per page.
pub const DEFAULT_PAGE_CAPACITY: usize = 1024;

/// Smallest accepted page payload.
pub const MIN_PAGE_CAPACITY: usize = 64;

/// Default B+Tree order for newly created indexes.
pub const DEFAULT_BTREE_ORDER: usize = 4;

/// Durability level
///
/// Trade-off between write latency and crash safety:
/// - Synchronous: fsync after every page or metadata write
/// - NoSync: leave flushing to the OS (tests and benchmarks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurabilityLevel {
    /// fsync after every write (default)
    #[default]
    Synchronous,

    /// Only write into OS buffers.
    ///
    /// A crash may lose every page written since the last OS flush.
    NoSync,
}

impl DurabilityLevel {
    /// Whether a write must be followed by `sync_all`
    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous (fsync per write)",
            Self::NoSync => "no sync (testing only)",
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DBConfig {
    /// Directory holding schema, data and index files
    pub data_dir: PathBuf,

    /// Payload bytes per page for newly created tables
    pub page_capacity: usize,

    /// Order (max children per internal node) for newly created indexes
    pub btree_order: usize,

    /// When page and metadata writes are flushed
    pub durability: DurabilityLevel,
}

impl Default for DBConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("pagedb_data"),
            page_capacity: DEFAULT_PAGE_CAPACITY,
            btree_order: DEFAULT_BTREE_ORDER,
            durability: DurabilityLevel::default(),
        }
    }
}

impl DBConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Config for tests: no fsync
    pub fn for_testing<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir).with_durability(DurabilityLevel::NoSync)
    }

    pub fn with_page_capacity(mut self, page_capacity: usize) -> Self {
        self.page_capacity = page_capacity;
        self
    }

    pub fn with_btree_order(mut self, btree_order: usize) -> Self {
        self.btree_order = btree_order;
        self
    }

    pub fn with_durability(mut self, durability: DurabilityLevel) -> Self {
        self.durability = durability;
        self
    }

    /// Load a config from a JSON document
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: DBConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_capacity < MIN_PAGE_CAPACITY {
            return Err(StorageError::InvalidArgument(format!(
                "page_capacity must be at least {}, got {}",
                MIN_PAGE_CAPACITY, self.page_capacity
            )));
        }
        if self.page_capacity > u32::MAX as usize {
            return Err(StorageError::InvalidArgument(format!(
                "page_capacity {} does not fit the page header",
                self.page_capacity
            )));
        }
        if self.btree_order < 3 {
            return Err(StorageError::InvalidArgument(format!(
                "btree_order must be at least 3, got {}",
                self.btree_order
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_durability_levels() {
        assert!(DurabilityLevel::Synchronous.requires_immediate_sync());
        assert!(!DurabilityLevel::NoSync.requires_immediate_sync());
        assert_eq!(DurabilityLevel::default(), DurabilityLevel::Synchronous);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(DBConfig::default().validate().is_ok());
        assert!(DBConfig::default().with_btree_order(2).validate().is_err());
        assert!(DBConfig::default().with_page_capacity(16).validate().is_err());
        assert!(DBConfig::default().with_btree_order(3).with_page_capacity(64).validate().is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pagedb.json");
        let config = DBConfig::for_testing(temp.path().join("data")).with_btree_order(5);
        std::fs::write(&path, serde_json::to_vec(&config).unwrap()).unwrap();

        let loaded = DBConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.btree_order, 5);
        assert_eq!(loaded.durability, DurabilityLevel::NoSync);
        assert_eq!(loaded.data_dir, temp.path().join("data"));
    }

    #[test]
    fn test_from_json_file_rejects_bad_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pagedb.json");
        let config = DBConfig::new(temp.path()).with_btree_order(1);
        std::fs::write(&path, serde_json::to_vec(&config).unwrap()).unwrap();

        assert!(DBConfig::from_json_file(&path).is_err());
    }
}
