use thiserror::Error;

use crate::storage::{RowId, TableId};

/// Malformed or unsupported SQL text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Syntax(String),
    #[error("empty statement")]
    Empty,
    #[error("expected a single statement but found {0}")]
    MultipleStatements(usize),
    #[error("unsupported syntax: {0}")]
    Unsupported(String),
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("table {0} already exists")]
    TableExists(String),
    #[error("no such table: {0}")]
    NoSuchTable(String),
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    #[error("table {0} must have at least one column")]
    NoColumns(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("row has {found} values but the table has {expected} columns")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("row {0} does not exist")]
    MissingRow(RowId),
    #[error("no partition for table id {0}")]
    UnknownPartition(TableId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("table {table} has {expected} columns but {found} values were supplied")]
    ArityMismatch {
        table: String,
        expected: usize,
        found: usize,
    },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("no such column: {0}")]
    UnknownColumn(String),
    #[error("ambiguous column name: {0}")]
    AmbiguousColumn(String),
    #[error("{0}")]
    ConstraintViolation(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session is not ready")]
    NotReady,
    #[error("session has been closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parser(#[from] ParseError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Execution error: {0}")]
    Execution(#[from] ExecError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}
