//! pagedb public API
//!
//! A single entry point for shells and UIs: submit statement text, get back a
//! typed result or a typed error.
//!
//! ```no_run
//! use pagedb::Database;
//!
//! let db = Database::open("pagedb_data")?;
//! db.submit("CREATE People(Id:int, Name:string DEFAULT anon, Born:date)")?;
//! db.submit("INSERT INTO People(Id, Born) VALUES (1, 10-07-2002), (2, 29-03-2006)")?;
//! db.submit("CREATEINDEX people_id ON People(Id)")?;
//!
//! for line in db.submit("SELECT Name FROM People WHERE Id = 2")?.lines() {
//!     println!("{}", line);
//! }
//! # Ok::<(), pagedb::StorageError>(())
//! ```

use crate::config::DBConfig;
use crate::error::Result;
use crate::sql::{execute_sql, QueryExecutor, QueryResult};
use crate::storage::Storage;
use parking_lot::Mutex;
use std::path::Path;

/// Database handle over one data directory
///
/// Statements run one at a time: `submit` takes an internal lock for the
/// whole statement. Other processes touching the same directory are not
/// coordinated with.
pub struct Database {
    config: DBConfig,
    executor: Mutex<QueryExecutor>,
}

impl Database {
    /// Open (creating if needed) a data directory with default settings
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open_with_config(DBConfig::new(data_dir))
    }

    /// Open with a custom configuration
    ///
    /// ```no_run
    /// use pagedb::{DBConfig, Database, DurabilityLevel};
    ///
    /// let config = DBConfig::new("pagedb_data")
    ///     .with_page_capacity(4096)
    ///     .with_btree_order(8)
    ///     .with_durability(DurabilityLevel::NoSync);
    /// let db = Database::open_with_config(config)?;
    /// # Ok::<(), pagedb::StorageError>(())
    /// ```
    pub fn open_with_config(config: DBConfig) -> Result<Self> {
        let storage = Storage::open(config.clone())?;
        tracing::debug!(
            data_dir = %config.data_dir.display(),
            durability = config.durability.description(),
            "opened database"
        );
        Ok(Self {
            config,
            executor: Mutex::new(QueryExecutor::new(storage)),
        })
    }

    pub fn config(&self) -> &DBConfig {
        &self.config
    }

    /// Execute one statement
    pub fn submit(&self, statement: &str) -> Result<QueryResult> {
        let executor = self.executor.lock();
        tracing::debug!(statement, "submit");
        execute_sql(&executor, statement).map_err(|e| {
            tracing::debug!(error = %e, kind = ?e.kind(), "statement failed");
            e
        })
    }

    /// Execute one statement and render the outcome as display lines; a
    /// failure becomes its message
    pub fn submit_lines(&self, statement: &str) -> Vec<String> {
        match self.submit(statement) {
            Ok(result) => result.lines(),
            Err(e) => vec![e.to_string()],
        }
    }
}
