//! Error types for the silo table engine.
//!
//! All public APIs return `SiloResult<T>` — no panics in library code.

use thiserror::Error;

/// Unified error type for all silo operations.
#[derive(Debug, Error)]
pub enum SiloError {
    /// Input validation failure (lengths, shapes, arguments)
    #[error("validation error: {0}")]
    Validation(String),

    /// Column name rejected by the naming rules
    #[error("invalid column name {name:?}: {reason}")]
    ColumnName { name: String, reason: String },

    /// Requested column does not exist
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// Column with that name already registered
    #[error("column '{0}' already exists")]
    ColumnExists(String),

    /// Operation requires at least one column
    #[error("table has no columns")]
    NoColumns,

    /// Mutation attempted on a read-only table
    #[error("table is opened read-only")]
    ReadOnly,

    /// Row index or key out of the addressable range
    #[error("index error: {0}")]
    Index(String),

    /// Type mismatch between expected and actual values
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Storage layer error (layout, corruption, etc.)
    #[error("storage error: {0}")]
    Storage(String),

    /// Create refused because the target directory exists
    #[error("root directory '{0}' already exists")]
    RootDirExists(String),

    /// Open failed because the directory or manifest is missing
    #[error("root directory '{0}' does not exist or has no manifest")]
    RootDirMissing(String),

    /// Copy destination equals the source root directory
    #[error("copy destination is the source root directory '{0}'")]
    CopyOntoSelf(String),

    /// Expression parse or evaluation error
    #[error("expression error: {message}\nexpression: {expression}")]
    Expr { message: String, expression: String },

    /// Feature or key shape deliberately unsupported
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Apache Arrow error (array/batch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Apache Parquet error (file bridge)
    #[error("parquet error: {source}")]
    Parquet {
        #[from]
        source: parquet::errors::ParquetError,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for all silo operations.
pub type SiloResult<T> = Result<T, SiloError>;

impl From<serde_json::Error> for SiloError {
    fn from(err: serde_json::Error) -> Self {
        SiloError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_validation() {
        let err = SiloError::Validation("column lengths differ".to_string());
        assert_eq!(err.to_string(), "validation error: column lengths differ");
    }

    #[test]
    fn error_display_column_not_found() {
        let err = SiloError::ColumnNotFound("price".to_string());
        assert_eq!(err.to_string(), "column 'price' not found");
    }

    #[test]
    fn error_display_type_mismatch() {
        let err = SiloError::TypeMismatch {
            expected: "Int64".to_string(),
            actual: "Utf8".to_string(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected Int64, got Utf8");
    }

    #[test]
    fn error_display_expr_carries_text() {
        let err = SiloError::Expr {
            message: "unknown identifier 'qty'".to_string(),
            expression: "qty > 10".to_string(),
        };
        assert!(err.to_string().contains("unknown identifier"));
        assert!(err.to_string().contains("qty > 10"));
    }

    #[test]
    fn error_from_serde_json() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: SiloError = bad.unwrap_err().into();
        assert!(matches!(err, SiloError::Serialization(_)));
    }

    #[test]
    fn silo_result_err() {
        let result: SiloResult<i32> = Err(SiloError::NoColumns);
        assert!(result.is_err());
    }
}
