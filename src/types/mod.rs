//! Schema and row types

mod row;
mod table;

pub use row::{Cell, TableRow};
pub use table::{Field, FieldType, SortKey, TableSchema, DATE_FORMAT};
