use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error from an object source backend (filesystem or GCS client).
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no files match {pattern}")]
    InputNotFound { pattern: String },

    #[error("invalid location {location}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("unsupported file type {0:?}, only csv can be read")]
    UnsupportedFileType(String),

    #[error("{file} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        file: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("date column {0:?} is not in the loaded data")]
    MissingColumn(String),

    /// `row` is the 0-based data row within `file` when the source file is
    /// known, otherwise within the whole column.
    #[error(
        "cannot parse {value:?} in column {column:?} ({}) as a date/time",
        row_location(.file, .row)
    )]
    ParseFailure {
        column: String,
        file: Option<String>,
        row: usize,
        value: String,
    },

    #[error("failed to write {}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reading {target}")]
    Source {
        target: String,
        #[source]
        source: SourceError,
    },

    #[error("csv error in {file}")]
    Csv {
        file: String,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn row_location(file: &Option<String>, row: &usize) -> String {
    match file {
        Some(file) => format!("row {} of {}", row, file),
        None => format!("row {}", row),
    }
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, malformed or unsupported input.
    Input,
    /// A declared date column holds a value that is not a date/time.
    Parse,
    /// The output file could not be written.
    Write,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ParseFailure { .. } => ErrorKind::Parse,
            Error::WriteFailure { .. } => ErrorKind::Write,
            Error::InputNotFound { .. }
            | Error::InvalidLocation { .. }
            | Error::UnsupportedFileType(_)
            | Error::SchemaMismatch { .. }
            | Error::MissingColumn(_)
            | Error::Source { .. }
            | Error::Csv { .. }
            | Error::Arrow(_)
            | Error::Io(_) => ErrorKind::Input,
        }
    }

    pub(crate) fn from_source(target: impl Into<String>, err: impl Into<SourceError>) -> Self {
        Error::Source {
            target: target.into(),
            source: err.into(),
        }
    }
}
