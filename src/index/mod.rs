//! Index layer implementation
//!
//! Secondary indexes are B+Tree snapshots built by a full table scan.

pub mod btree;

pub use btree::{Address, BPlusTree};
