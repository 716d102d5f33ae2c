// ⚠️ Error taxonomy for ingestion, storage and correlation
//
// Parsing-level anomalies (malformed cells, unmapped geographies) never reach
// this enum: they are counted and dropped by the extractor. Everything here is
// structural and goes back to the caller.

use thiserror::Error;

/// Common result type for library operations
pub type Result<T> = std::result::Result<T, IndicatorError>;

#[derive(Error, Debug)]
pub enum IndicatorError {
    /// Every header candidate was tried and none carried the requested label
    #[error("column '{column}' not found in sheet '{sheet}'; columns read: {last_columns:?}")]
    ColumnNotFound {
        column: String,
        sheet: String,
        last_columns: Vec<String>,
    },

    /// No first-column cell matched a known geography name
    #[error("no geography rows found in sheet '{sheet}'")]
    NoGeographyRows { sheet: String },

    /// First geography row has no non-blank row above it
    #[error("no header row above first data row {data_row} in sheet '{sheet}'")]
    HeaderNotFound { sheet: String, data_row: usize },

    #[error("sheet '{sheet}' not found; available sheets: {available:?}")]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    /// A read with an assumed header row failed
    #[error("failed to read sheet '{sheet}': {reason}")]
    SheetRead { sheet: String, reason: String },

    #[error("indicator not found: {0}")]
    IndicatorNotFound(String),

    /// Fewer than the minimum number of geographies are shared by both series
    #[error("insufficient data for correlation (n={count})")]
    InsufficientSample { count: usize },

    /// One side of the aligned pairs is constant, so r is undefined
    #[error("indicator '{indicator}' has zero variance over the aligned geographies")]
    DegenerateSeries { indicator: String },

    #[error("invalid geography level: {0}")]
    InvalidGeoLevel(String),

    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndicatorError {
    /// True for conditions the caller should report as "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IndicatorError::IndicatorNotFound(_)
                | IndicatorError::SheetNotFound { .. }
                | IndicatorError::FileNotFound(_)
        )
    }

    /// True for conditions caused by the request itself (bad sheet/column,
    /// too little data). Retrying without changing input will not help.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            IndicatorError::ColumnNotFound { .. }
                | IndicatorError::NoGeographyRows { .. }
                | IndicatorError::HeaderNotFound { .. }
                | IndicatorError::SheetRead { .. }
                | IndicatorError::InsufficientSample { .. }
                | IndicatorError::DegenerateSeries { .. }
                | IndicatorError::InvalidGeoLevel(_)
                | IndicatorError::UnsupportedFile(_)
                | IndicatorError::Spreadsheet(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_not_found_message_carries_columns() {
        let err = IndicatorError::ColumnNotFound {
            column: "Total".to_string(),
            sheet: "Tabela 1".to_string(),
            last_columns: vec!["Unidade".to_string(), "Homens".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("Total"));
        assert!(msg.contains("Homens"));
        assert!(err.is_bad_request());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_insufficient_sample_reports_count() {
        let err = IndicatorError::InsufficientSample { count: 2 };
        assert_eq!(err.to_string(), "insufficient data for correlation (n=2)");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(IndicatorError::IndicatorNotFound("MOCK_C".to_string()).is_not_found());
        assert!(IndicatorError::FileNotFound("x.xlsx".to_string()).is_not_found());
    }
}
