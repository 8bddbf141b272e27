//! Error types for the report pipeline

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A caller-supplied parameter is out of range. Raised before any query runs.
    #[error("invalid {name}: {value:?} (expected an integer between 1 and 12)")]
    InvalidParameter { name: &'static str, value: String },

    /// The log store could not be opened or a rollup query failed.
    #[error("log store access failed for {rollup} (month {month}): {source}")]
    StoreAccess {
        rollup: &'static str,
        month: i64,
        #[source]
        source: sqlx::Error,
    },

    /// A reference dataset is missing expected columns or cannot be parsed.
    #[error("{source_name}: {message}")]
    DataFormat { source_name: String, message: String },

    /// The report sink refused a table.
    #[error("report sink failed: {0}")]
    Sink(String),
}

impl ReportError {
    pub fn data_format(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call can succeed. Only store failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreAccess { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Non-fatal: the country reference listed a code more than once.
/// The first occurrence is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinIntegrityWarning {
    pub country_code: String,
    pub occurrences: usize,
}

impl std::fmt::Display for JoinIntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "country reference lists {} {} times; using the first entry",
            self.country_code, self.occurrences
        )
    }
}
