//! pagedb storage engine
//!
//! A single-directory table store driven by a small statement language.
//!
//! ## Architecture
//! - Storage: one paged data file per table, fixed-capacity pages, CRC32 per page
//! - Catalog: JSON schema files and index files named after what they cover
//! - Index: arena B+Tree over canonicalized column values, persisted whole
//! - SQL: lexer, per-statement parsers, predicate evaluator, executor
//!
//! Statements enter through [`Database::submit`].

pub mod config;
pub mod index;
pub mod sql;
pub mod storage;
pub mod types;

mod api;
mod error;

pub use api::Database;
pub use config::{DBConfig, DurabilityLevel};
pub use error::{ErrorKind, PageDBError, Result, StorageError};
pub use sql::{execute_sql, QueryResult};
