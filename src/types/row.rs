//! Table rows as read back from pages
use super::table::{FieldType, TableSchema};
use crate::error::{Result, StorageError};

/// One field of a row: name, stored text and declared type.
///
/// `value == None` is the empty-value marker, distinct from `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    pub name: String,
    pub value: Option<String>,
    pub field_type: FieldType,
}

impl Cell {
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

/// A row in schema order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRow {
    pub cells: Vec<Cell>,
}

impl TableRow {
    /// Pair raw stored values with the schema fields
    pub fn from_values(schema: &TableSchema, values: Vec<Option<String>>) -> Result<Self> {
        if values.len() != schema.field_count() {
            return Err(StorageError::Corruption(format!(
                "Row in table {} has {} values, schema has {} fields",
                schema.name,
                values.len(),
                schema.field_count()
            )));
        }

        let cells = schema
            .fields
            .iter()
            .zip(values)
            .map(|(field, value)| Cell {
                name: field.name.clone(),
                value,
                field_type: field.field_type,
            })
            .collect();

        Ok(Self { cells })
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.name == name)
    }

    /// `v1, v2, v3`
    pub fn to_line(&self) -> String {
        self.cells
            .iter()
            .map(|c| c.display_value())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
