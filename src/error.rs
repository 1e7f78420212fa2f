//! Typed failures surfaced by the ingestion and query operations.
//!
//! Every variant maps onto exactly one [`ErrorKind`], which is what callers
//! match on to choose a status or exit code. Messages always name the
//! offending source, task or value.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DataFormat,
    UnsupportedFormat,
    SourceFetch,
    NoValidSources,
    NotFound,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::DataFormat => "data_format",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::SourceFetch => "source_fetch",
            ErrorKind::NoValidSources => "no_valid_sources",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
        }
    }

    /// Process exit code used by the command-line surface.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::InvalidInput => 2,
            ErrorKind::UnsupportedFormat => 3,
            ErrorKind::DataFormat => 4,
            ErrorKind::SourceFetch => 5,
            ErrorKind::NoValidSources => 6,
            ErrorKind::NotFound => 7,
            ErrorKind::Persistence => 8,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Source '{source_name}' could not be parsed: {message}")]
    DataFormat {
        source_name: String,
        message: String,
    },

    #[error("Source '{source_name}' has an unsupported format{}", detail_suffix(.detail))]
    UnsupportedFormat {
        source_name: String,
        detail: Option<String>,
    },

    #[error("Failed to fetch '{url}': {message}")]
    SourceFetch { url: String, message: String },

    #[error("No valid data sources provided")]
    NoValidSources,

    #[error("Task '{0}' not found")]
    NotFound(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Persistence failure: {0}")]
    PersistenceState(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

impl ReportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::InvalidInput(_) => ErrorKind::InvalidInput,
            ReportError::DataFormat { .. } => ErrorKind::DataFormat,
            ReportError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ReportError::SourceFetch { .. } => ErrorKind::SourceFetch,
            ReportError::NoValidSources => ErrorKind::NoValidSources,
            ReportError::NotFound(_) => ErrorKind::NotFound,
            ReportError::Persistence(_) | ReportError::PersistenceState(_) => {
                ErrorKind::Persistence
            }
        }
    }

    pub fn data_format(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        ReportError::DataFormat {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn unsupported(source_name: impl Into<String>, detail: Option<String>) -> Self {
        ReportError::UnsupportedFormat {
            source_name: source_name.into(),
            detail,
        }
    }

    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        ReportError::SourceFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
