//! Structured error types for xlgrid.
//!
//! Structural misuse (unknown or duplicate columns, rows past the end, values
//! that cannot be coerced) surfaces here. Bounds misses on projection lookups
//! are not errors; those return `None`.

use crate::types::ColumnType;

/// All errors that can occur in the grid data layer.
#[derive(Debug, thiserror::Error)]
pub enum XlgridError {
    /// Index outside the valid bounds of a sequence.
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Column identifier is not registered.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Column identifier is already registered.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// Value cannot be stored in a column of the declared type.
    #[error("type mismatch in column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    /// Row outside `[0, row_count)`.
    #[error("row {row} out of range (row count {row_count})")]
    RowOutOfRange { row: usize, row_count: usize },

    /// Bulk column data whose length differs from the store's row count.
    #[error("column {column} has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// A projection built over a different data row count than the store.
    #[error("projection covers {found} rows, store has {expected}")]
    ProjectionMismatch { expected: usize, found: usize },

    /// A projection listed the same data row twice.
    #[error("data index {0} appears more than once in projection")]
    DuplicateIndex(usize),

    /// Configuration could not be parsed.
    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XlgridError>;

impl XlgridError {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    pub(crate) fn row_out_of_range(row: usize, row_count: usize) -> Self {
        Self::RowOutOfRange { row, row_count }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = XlgridError::out_of_range(7, 5);
        assert_eq!(err.to_string(), "index 7 out of range (len 5)");

        let err = XlgridError::TypeMismatch {
            column: "price".into(),
            expected: ColumnType::Numeric,
            found: "text",
        };
        assert_eq!(
            err.to_string(),
            "type mismatch in column price: expected numeric, found text"
        );
    }

    #[test]
    fn test_config_error_from_json() {
        let err: XlgridError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, XlgridError::Config(_)));
    }
}
