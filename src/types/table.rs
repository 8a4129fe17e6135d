//! Table schema definitions: field types, fields and the ordered schema
use crate::error::{Result, StorageError};
use ahash::AHashMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Date literal format (`29-03-2006`)
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Declared field type. Values are always stored as text; the type only
/// decides how two values compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Date,
    String,
}

impl FieldType {
    /// Type names as written in statements (case-sensitive)
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "int" => Some(FieldType::Int),
            "date" => Some(FieldType::Date),
            "string" => Some(FieldType::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Date => "date",
            FieldType::String => "string",
        }
    }

    /// Check that `value` can be read under this type
    pub fn validate(&self, value: &str) -> Result<()> {
        match self {
            FieldType::Int => parse_int(value).map(|_| ()),
            FieldType::Date => parse_date(value).map(|_| ()),
            FieldType::String => Ok(()),
        }
    }

    /// Normal form used for index keys, so `03` and `3` land on the same int key
    pub fn canonical(&self, value: &str) -> Result<String> {
        match self {
            FieldType::Int => Ok(parse_int(value)?.to_string()),
            FieldType::Date => Ok(parse_date(value)?.format(DATE_FORMAT).to_string()),
            FieldType::String => Ok(value.to_string()),
        }
    }

    /// Ordering key for ORDERBY; missing values sort first
    pub fn sort_key(&self, value: Option<&str>) -> Result<SortKey> {
        let Some(value) = value else {
            return Ok(SortKey::Empty);
        };
        match self {
            FieldType::Int => Ok(SortKey::Int(parse_int(value)?)),
            FieldType::Date => Ok(SortKey::Date(parse_date(value)?)),
            FieldType::String => Ok(SortKey::Text(value.to_string())),
        }
    }

    /// Compare two stored values under this type
    pub fn compare(&self, left: &str, right: &str) -> Result<Ordering> {
        match self {
            FieldType::Int => Ok(parse_int(left)?.cmp(&parse_int(right)?)),
            FieldType::Date => Ok(parse_date(left)?.cmp(&parse_date(right)?)),
            FieldType::String => Ok(left.cmp(right)),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed sort key. Variant order puts `Empty` before every value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Empty,
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

fn parse_int(value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| StorageError::TypeMismatch(format!("'{}' is not an int", value)))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| StorageError::TypeMismatch(format!("'{}' is not a dd-MM-yyyy date", value)))
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub default_value: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Table schema. Field order is the on-disk column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<Field>,
    /// Field name -> position
    #[serde(skip)]
    field_map: AHashMap<String, usize>,
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl Eq for TableSchema {}

impl TableSchema {
    /// Build a schema, rejecting empty field lists, duplicate names and
    /// defaults that do not fit their field type.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        if fields.is_empty() {
            return Err(StorageError::semantic(format!("Table {} must have at least one field", name)));
        }

        let mut schema = Self {
            name,
            fields,
            field_map: AHashMap::new(),
        };
        schema.rebuild_field_map();

        if schema.field_map.len() != schema.fields.len() {
            return Err(StorageError::semantic(format!(
                "Table {} declares a field name more than once",
                schema.name
            )));
        }

        for field in &schema.fields {
            if let Some(default) = &field.default_value {
                field.field_type.validate(default).map_err(|e| {
                    StorageError::semantic(format!("Default for field {}: {}", field.name, e))
                })?;
            }
        }

        Ok(schema)
    }

    /// Decode a schema file
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let mut schema: TableSchema = serde_json::from_slice(data)?;
        schema.rebuild_field_map();
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Rebuild field map (call after deserialization)
    pub fn rebuild_field_map(&mut self) {
        self.field_map.clear();
        for (position, field) in self.fields.iter().enumerate() {
            self.field_map.insert(field.name.clone(), position);
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.field_map.get(name).copied()
    }

    /// Like `position`, as a `ColumnNotFound` error
    pub fn require_position(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| StorageError::ColumnNotFound(format!("{} in table {}", name, self.name)))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Human-readable description used by INFO
    pub fn describe(&self) -> String {
        let mut out = format!("Name: {}\n", self.name);
        for field in &self.fields {
            out.push_str(&format!("\tfield: {}:{}", field.name, field.field_type));
            if let Some(default) = &field.default_value {
                out.push_str(&format!(" default {}", default));
            }
            out.push('\n');
        }
        out
    }
}
