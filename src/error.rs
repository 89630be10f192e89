/*!
 * Error handling for pharmacy license data operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// Library result type
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        column: Option<String>,
        context: ErrorContext,
    },

    /// Data validation errors with detailed information
    #[error("Data validation error: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// File not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// A required header is absent from a source file
    #[error("Missing required column '{column}'")]
    MissingColumn {
        column: String,
        found_columns: Vec<String>,
        context: ErrorContext,
    },

    /// Date parsing errors with format hints
    #[error("Date parsing error: {message}")]
    DateParse {
        message: String,
        value: String,
        expected_format: String,
    },

    /// A selection references a column that is not a facet
    #[error("Unknown facet '{name}'")]
    UnknownFacet {
        name: String,
        valid_facets: Vec<String>,
    },

    /// A facet value that cannot be interpreted for its facet
    #[error("Invalid value '{value}' for facet '{facet}'")]
    InvalidFacetValue {
        facet: String,
        value: String,
        valid_values: Vec<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
    pub column_name: Option<String>,
    pub pharmacy_name: Option<String>,
}

/// Output format for exports and error context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    JsonLines,
    Csv,
}

impl ExportFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "jsonl" | "ndjson" => Some(ExportFormat::JsonLines),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl ExplorerError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let name = path.to_string_lossy();
        let suggestion = if name.contains("available_pharmacies") {
            format!(
                "Check if the file exists at '{}'. The available pharmacies file is optional; \
                omit it to explore the full license list only.",
                path.display()
            )
        } else if name.contains("all_pharmacies") {
            format!(
                "Check if the file exists at '{}'. The license list is expected as 'all_pharmacies.csv' \
                in the data directory.",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create a missing column error listing what the header did contain
    pub fn missing_column(column: &str, found_columns: &[String], file_path: Option<PathBuf>) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            found_columns: found_columns.to_vec(),
            context: ErrorContext {
                file_path,
                column_name: Some(column.to_string()),
                ..Default::default()
            },
        }
    }

    /// Create an unknown facet error with the list of valid facet names
    pub fn unknown_facet(name: &str) -> Self {
        Self::UnknownFacet {
            name: name.to_string(),
            valid_facets: crate::data_types::Facet::all()
                .iter()
                .map(|f| f.column_name().to_string())
                .collect(),
        }
    }

    /// Create an invalid purchasing style error
    pub fn invalid_purchasing_style(value: &str) -> Self {
        Self::InvalidFacetValue {
            facet: crate::constants::COL_PURCHASING_STYLE.to_string(),
            value: value.to_string(),
            valid_values: vec![
                "Patient-Specific (503A)".to_string(),
                "Bulk (503B)".to_string(),
            ],
        }
    }

    /// Create a date parsing error with format information
    pub fn date_parse_with_format(value: &str, expected_format: &str) -> Self {
        Self::DateParse {
            message: format!("Cannot parse '{}' as date", value),
            value: value.to_string(),
            expected_format: expected_format.to_string(),
        }
    }

    /// Whether this error is a programming error in a filter request
    pub fn is_filter_error(&self) -> bool {
        matches!(self, Self::UnknownFacet { .. } | Self::InvalidFacetValue { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::MissingColumn { found_columns, .. } => {
                format!("{}\n\nColumns present: {}", self, found_columns.join(", "))
            }
            Self::UnknownFacet { valid_facets, .. } => {
                format!("{}\n\nValid facets: {}", self, valid_facets.join(", "))
            }
            Self::InvalidFacetValue { valid_values, .. } => {
                format!("{}\n\nValid values: {}", self, valid_values.join(", "))
            }
            Self::DateParse { expected_format, .. } => {
                format!("{}\n\nExpected format: {}", self, expected_format)
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for ExplorerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for ExplorerError {
    fn from(err: csv::Error) -> Self {
        let (line, message) = match err.position() {
            Some(pos) => (Some(pos.line() as usize), err.to_string()),
            None => (None, err.to_string()),
        };

        Self::CsvParse {
            message,
            line,
            column: None,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        ExplorerError::Export {
            message: err.to_string(),
            format: ExportFormat::Json,
            suggestion: Some("Check if the data is serializable to JSON.".to_string()),
        }
    }
}
