//! Error types for strata core tables.

use thiserror::Error;

/// Result type alias for core table operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for table construction and column manipulation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// A column name appeared more than once in a table definition.
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    /// A column was supplied with a length different from the table's
    /// row count.
    #[error("column {column} has {got} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        got: usize,
    },
}
