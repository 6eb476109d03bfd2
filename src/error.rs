//! Error types for the inventory ledger.

use thiserror::Error;

/// Result type alias using [`InventoryError`].
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Main error type for the ledger library.
///
/// Lookups that find nothing are not errors: `Store::get_by_id` returns
/// `Ok(None)` instead.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// A raw field could not be coerced into its typed value.
    #[error("Format error in {field} ({value:?}): {reason}")]
    Format {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// A row of a batch failed to normalize.
    #[error("Row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<InventoryError>,
    },

    /// Underlying SQLite failure. Any open batch transaction is rolled back.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization of event data failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InventoryError {
    /// Create a format error for `field`.
    pub fn format(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        InventoryError::Format {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap an error with the 1-based data row it came from.
    pub fn at_row(self, row: usize) -> Self {
        InventoryError::Row {
            row,
            source: Box::new(self),
        }
    }

    /// True for normalization failures, including ones wrapped with a row.
    pub fn is_format(&self) -> bool {
        match self {
            InventoryError::Format { .. } => true,
            InventoryError::Row { source, .. } => source.is_format(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = InventoryError::format("product_price", "$abc", "not a decimal amount");
        assert_eq!(
            err.to_string(),
            "Format error in product_price (\"$abc\"): not a decimal amount"
        );
        assert!(err.is_format());
    }

    #[test]
    fn test_row_wrapping_keeps_format_kind() {
        let err = InventoryError::format("product_quantity", "x", "not an integer").at_row(3);
        assert!(err.is_format());
        assert!(err.to_string().starts_with("Row 3: "));
    }
}
