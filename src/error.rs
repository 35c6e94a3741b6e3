//! Error types for the binding engine.

use std::panic::Location;
use thiserror::Error;

use crate::native::DiagRecord;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for connection, statement and result operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The requested type cannot represent the native column or parameter type.
    #[error("Type incompatible: {message}")]
    TypeIncompatible { message: String },

    /// A null value was read without a fallback.
    #[error("Null access: column {column} is NULL")]
    NullAccess { column: String },

    /// Column, parameter or descriptor record index out of range, or an unknown column name.
    #[error("Index out of range: {message}")]
    IndexRange { message: String },

    /// API misuse for the current object state.
    #[error("Programming error: {message}")]
    Programming { message: String },

    /// Failure reported by the native driver or driver manager.
    #[error("{state} ({native}): {message}")]
    Database {
        native: i32,
        state: String,
        message: String,
    },

    /// The driver does not support the requested optional feature.
    #[error("Not supported: {feature}")]
    NotSupported { feature: String },

    /// A buffer element was shorter than its native layout.
    #[error("Buffer too small: need {needed} bytes, have {available} filed at {location}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        location: &'static Location<'static>,
    },
}

impl Error {
    /// Create a type incompatibility error.
    pub fn type_incompatible(message: impl Into<String>) -> Self {
        Self::TypeIncompatible {
            message: message.into(),
        }
    }

    /// Create a null access error for the named column.
    pub fn null_access(column: impl Into<String>) -> Self {
        Self::NullAccess {
            column: column.into(),
        }
    }

    /// Create an index range error.
    pub fn index_range(message: impl Into<String>) -> Self {
        Self::IndexRange {
            message: message.into(),
        }
    }

    /// Create a programming error.
    pub fn programming(message: impl Into<String>) -> Self {
        Self::Programming {
            message: message.into(),
        }
    }

    /// Create a not-supported error.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::NotSupported {
            feature: feature.into(),
        }
    }

    /// Create a database error that did not come from the driver.
    pub fn database(state: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            native: 0,
            state: state.into(),
            message: message.into(),
        }
    }

    /// Compose a database error from the native diagnostic records of a failed call.
    ///
    /// The first record supplies the state and native code; the message joins
    /// every record, prefixed with `context` and the caller location.
    pub fn from_diagnostics(
        records: &[DiagRecord],
        context: &str,
        location: &'static Location<'static>,
    ) -> Self {
        let (state, native) = records
            .first()
            .map(|r| (r.state.clone(), r.native))
            .unwrap_or_else(|| ("HY000".to_string(), 0));

        let details = if records.is_empty() {
            "no diagnostic information available".to_string()
        } else {
            records
                .iter()
                .map(|r| format!("[{}] {}", r.state, r.message))
                .collect::<Vec<_>>()
                .join("; ")
        };

        Self::Database {
            native,
            state,
            message: format!(
                "{}:{}: {}: {}",
                location.file(),
                location.line(),
                context,
                details
            ),
        }
    }

    /// The five-character SQL state, for database errors.
    pub fn state(&self) -> Option<&str> {
        match self {
            Error::Database { state, .. } => Some(state),
            _ => None,
        }
    }

    /// The native driver error number, for database errors.
    pub fn native(&self) -> Option<i32> {
        match self {
            Error::Database { native, .. } => Some(*native),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_diagnostics_joins_records() {
        let records = vec![
            DiagRecord::new("42S02", 208, "Invalid object name 't'"),
            DiagRecord::new("42000", 8180, "Statement(s) could not be prepared"),
        ];
        let err = Error::from_diagnostics(&records, "SQLPrepare", Location::caller());
        assert_eq!(err.state(), Some("42S02"));
        assert_eq!(err.native(), Some(208));
        let text = err.to_string();
        assert!(text.contains("SQLPrepare"));
        assert!(text.contains("Invalid object name"));
        assert!(text.contains("could not be prepared"));
    }

    #[test]
    fn test_from_diagnostics_without_records() {
        let err = Error::from_diagnostics(&[], "SQLFetch", Location::caller());
        assert_eq!(err.state(), Some("HY000"));
        assert!(err.to_string().contains("no diagnostic information"));
    }

    #[test]
    fn test_local_errors_have_no_state() {
        assert_eq!(Error::programming("x").state(), None);
        assert_eq!(Error::null_access("id").native(), None);
    }
}
