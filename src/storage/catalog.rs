//! Storage handle: the only owner of the data directory
//!
//! File naming inside the data directory:
//! ```text
//! <table>.tbl                  paged data file
//! <table>.schema.json          schema
//! <index>@<table>@<column>.idx B+Tree index snapshot
//! ```
//! Every operation opens the files it needs and closes them before returning.
use super::table_file::TableFile;
use crate::config::DBConfig;
use crate::error::{Result, StorageError};
use crate::types::TableSchema;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const DATA_EXT: &str = ".tbl";
const SCHEMA_EXT: &str = ".schema.json";
const INDEX_EXT: &str = ".idx";
const INDEX_SEPARATOR: char = '@';

/// An index file discovered in the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub table: String,
    pub column: String,
    pub path: PathBuf,
}

/// Names end up in file names, so they are restricted to `[A-Za-z0-9_-]+`.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(StorageError::semantic(format!("Invalid {} name {:?}", kind, name)));
    }
    Ok(())
}

/// Capability handle over the data directory
#[derive(Debug, Clone)]
pub struct Storage {
    config: DBConfig,
}

impl Storage {
    /// Validate the config and create the data directory if needed
    pub fn open(config: DBConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DBConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Every path below is built from a validated name, so nothing can
    /// resolve outside the data directory.
    pub fn data_path(&self, table: &str) -> Result<PathBuf> {
        validate_identifier("table", table)?;
        Ok(self.data_dir().join(format!("{}{}", table, DATA_EXT)))
    }

    pub fn schema_path(&self, table: &str) -> Result<PathBuf> {
        validate_identifier("table", table)?;
        Ok(self.data_dir().join(format!("{}{}", table, SCHEMA_EXT)))
    }

    pub fn index_path(&self, index: &str, table: &str, column: &str) -> Result<PathBuf> {
        validate_identifier("index", index)?;
        validate_identifier("table", table)?;
        validate_identifier("field", column)?;
        Ok(self.data_dir().join(format!(
            "{index}{sep}{table}{sep}{column}{ext}",
            sep = INDEX_SEPARATOR,
            ext = INDEX_EXT
        )))
    }

    fn sync_file(&self, path: &Path) -> Result<()> {
        if self.config.durability.requires_immediate_sync() {
            fs::File::open(path)?.sync_all()?;
        }
        Ok(())
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// False for names that could never have been created
    pub fn table_exists(&self, table: &str) -> bool {
        match (self.data_path(table), self.schema_path(table)) {
            (Ok(data), Ok(schema)) => data.exists() && schema.exists(),
            _ => false,
        }
    }

    /// Write the schema file and a data file holding one empty page
    pub fn create_table(&self, schema: &TableSchema) -> Result<()> {
        validate_identifier("table", &schema.name)?;
        for field in &schema.fields {
            validate_identifier("field", &field.name)?;
        }

        let data_path = self.data_path(&schema.name)?;
        let schema_path = self.schema_path(&schema.name)?;
        if data_path.exists() || schema_path.exists() {
            return Err(StorageError::AlreadyExists(format!("Table {}", schema.name)));
        }

        let mut schema_file = OpenOptions::new().write(true).create_new(true).open(&schema_path)?;
        schema_file.write_all(&schema.to_json()?)?;
        drop(schema_file);
        self.sync_file(&schema_path)?;

        TableFile::create(&data_path, self.config.page_capacity, self.config.durability)?;
        tracing::info!(table = %schema.name, "created table");
        Ok(())
    }

    /// Remove a table's files together with every index built on it
    pub fn drop_table(&self, table: &str) -> Result<()> {
        if !self.table_exists(table) {
            return Err(StorageError::TableNotFound(table.to_string()));
        }

        for entry in self.list_indexes()?.into_iter().filter(|e| e.table == table) {
            fs::remove_file(&entry.path)?;
            tracing::info!(index = %entry.name, table, "dropped index with its table");
        }
        fs::remove_file(self.schema_path(table)?)?;
        fs::remove_file(self.data_path(table)?)?;
        tracing::info!(table, "dropped table");
        Ok(())
    }

    /// Table names, sorted
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(self.data_dir())? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(table) = file_name.strip_suffix(DATA_EXT) {
                if self.table_exists(table) {
                    tables.push(table.to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    pub fn read_schema(&self, table: &str) -> Result<TableSchema> {
        if !self.table_exists(table) {
            return Err(StorageError::TableNotFound(table.to_string()));
        }
        let data = fs::read(self.schema_path(table)?)?;
        TableSchema::from_json(&data)
    }

    /// Schema plus an open data file
    pub fn open_table(&self, table: &str) -> Result<(TableSchema, TableFile)> {
        let schema = self.read_schema(table)?;
        let file = TableFile::open(&self.data_path(table)?, self.config.durability)?;
        Ok((schema, file))
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Every index file in the data directory, sorted by name
    pub fn list_indexes(&self) -> Result<Vec<IndexEntry>> {
        let mut indexes = Vec::new();
        for entry in fs::read_dir(self.data_dir())? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(INDEX_EXT)) else {
                continue;
            };
            let parts: Vec<&str> = stem.split(INDEX_SEPARATOR).collect();
            if let [name, table, column] = parts.as_slice() {
                indexes.push(IndexEntry {
                    name: name.to_string(),
                    table: table.to_string(),
                    column: column.to_string(),
                    path: entry.path(),
                });
            }
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    pub fn find_index_by_name(&self, name: &str) -> Result<Option<IndexEntry>> {
        Ok(self.list_indexes()?.into_iter().find(|e| e.name == name))
    }

    pub fn find_index_on(&self, table: &str, column: &str) -> Result<Option<IndexEntry>> {
        Ok(self
            .list_indexes()?
            .into_iter()
            .find(|e| e.table == table && e.column == column))
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        let entry = self
            .find_index_by_name(name)?
            .ok_or_else(|| StorageError::IndexNotFound(name.to_string()))?;
        fs::remove_file(&entry.path)?;
        tracing::info!(index = name, table = %entry.table, "dropped index");
        Ok(())
    }
}
