//! Query representation: one variant per statement kind
use super::token::Token;
use crate::types::Field;
use std::fmt;

/// Statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Create,
    Drop,
    List,
    Info,
    Select,
    Delete,
    Insert,
    CreateIndex,
    DropIndex,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Create => "CREATE",
            Method::Drop => "DROP",
            Method::List => "LIST",
            Method::Info => "INFO",
            Method::Select => "SELECT",
            Method::Delete => "DELETE",
            Method::Insert => "INSERT",
            Method::CreateIndex => "CREATEINDEX",
            Method::DropIndex => "DROPINDEX",
        };
        f.write_str(name)
    }
}

/// Columns requested by SELECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `*`
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projection: Projection,
    pub table: String,
    /// WHERE tokens, verbatim
    pub predicates: Vec<Token>,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertQuery {
    pub table: String,
    /// Explicit field list, in statement order
    pub fields: Vec<String>,
    /// One tuple per parenthesized VALUES group, unquoted
    pub rows: Vec<Vec<String>>,
}

/// A parsed statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    CreateTable { table: String, fields: Vec<Field> },
    DropTables(Vec<String>),
    ListTables,
    TableInfo(String),
    Select(SelectQuery),
    Delete { table: String, predicates: Vec<Token> },
    Insert(InsertQuery),
    CreateIndex { index: String, table: String, column: String },
    DropIndexes(Vec<String>),
}

impl Query {
    pub fn method(&self) -> Method {
        match self {
            Query::CreateTable { .. } => Method::Create,
            Query::DropTables(_) => Method::Drop,
            Query::ListTables => Method::List,
            Query::TableInfo(_) => Method::Info,
            Query::Select(_) => Method::Select,
            Query::Delete { .. } => Method::Delete,
            Query::Insert(_) => Method::Insert,
            Query::CreateIndex { .. } => Method::CreateIndex,
            Query::DropIndexes(_) => Method::DropIndex,
        }
    }

    /// Table the statement reads or writes, if it names exactly one
    pub fn table(&self) -> Option<&str> {
        match self {
            Query::CreateTable { table, .. }
            | Query::Delete { table, .. }
            | Query::CreateIndex { table, .. } => Some(table),
            Query::TableInfo(table) => Some(table),
            Query::Select(select) => Some(&select.table),
            Query::Insert(insert) => Some(&insert.table),
            Query::DropTables(_) | Query::ListTables | Query::DropIndexes(_) => None,
        }
    }
}
