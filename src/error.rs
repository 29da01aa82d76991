//! Error types for pkgselect

use thiserror::Error;

/// Main error type for selection operations
///
/// `NotFound`, `MissingItems` and `Validation` are returned *after* the call
/// applied whatever it could to the valid part of its input. Callers treat
/// them as warnings about the rejected names, not as a rolled-back failure.
#[derive(Error, Debug)]
pub enum SelectError {
    #[error("Package environment not initialized")]
    NotInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not found: {}", .0.join(", "))]
    MissingItems(Vec<String>),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Selection file error at line {line}: {message}")]
    SelectionFile { line: usize, message: String },
}

impl SelectError {
    /// True for the partial-apply kinds: the call did its work for every
    /// valid entry and only reports the rejected ones.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SelectError::NotFound(_) | SelectError::MissingItems(_) | SelectError::Validation(_)
        )
    }
}

impl From<rusqlite::Error> for SelectError {
    fn from(err: rusqlite::Error) -> Self {
        SelectError::Database(err.to_string())
    }
}

/// Result type alias for selection operations
pub type Result<T> = std::result::Result<T, SelectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_items_message() {
        let err = SelectError::MissingItems(vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(err.to_string(), "Not found: foo, bar");
        assert!(err.is_warning());
        assert!(!SelectError::NotInitialized.is_warning());
    }
}
