//! Error types for the OIFITS loader

use std::fmt;

use thiserror::Error;

use crate::registry::RecordType;
use crate::value::ValueKind;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, OifitsError>;

/// Errors raised by the container engine underneath the loader.
///
/// These are fatal to a load and pass through the loader unmodified.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No extension at position {0}")]
    NoSuchExtension(usize),

    #[error("No column at index {0}")]
    NoSuchColumn(usize),

    #[error("Rows {first}..{end} out of range (table has {rows} rows)")]
    RowsOutOfRange { first: usize, end: usize, rows: usize },

    #[error("Malformed container: {0}")]
    Malformed(String),
}

/// Loader errors
#[derive(Error, Debug)]
pub enum OifitsError {
    #[error("Missing keyword: {0}")]
    MissingKeyword(String),

    #[error("Type mismatch for keyword {keyword}: expected {expected}, found {found}")]
    TypeMismatch {
        keyword: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unsupported column type for {column}: {form}")]
    UnsupportedColumnType { column: String, form: String },

    #[error("Invalid dimensions for column {column}: {message}")]
    InvalidDimensions { column: String, message: String },

    #[error("Column {column} holds {found} elements, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Incomplete {record_type} record in extension {extension}: {}", FieldFailures(.failures))]
    IncompleteRecord {
        extension: usize,
        record_type: RecordType,
        failures: Vec<FieldFailure>,
    },

    #[error("Unknown record identity: {0}")]
    UnknownRecordIdentity(String),

    #[error("Unsupported revision {revision} for {identity}")]
    UnsupportedRevision { identity: String, revision: i64 },

    #[error("Duplicate {0} record: at most one is allowed per dataset")]
    DuplicateSingleton(RecordType),

    #[error("Cross-references are not available before the dataset is updated")]
    NotFinalized,

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OifitsError {
    /// Whether this error came from the container engine rather than from
    /// the content of an extension.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Container(_) | Self::Io(_))
    }
}

/// One field that could not be resolved while building a record.
#[derive(Debug)]
pub struct FieldFailure {
    pub field: String,
    pub error: OifitsError,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.error)
    }
}

struct FieldFailures<'a>(&'a [FieldFailure]);

impl fmt::Display for FieldFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}
