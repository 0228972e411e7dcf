use thiserror::Error;

use crate::schema::DataType;

/// Canonical result across rowmap crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Fatal at construction: bad declarations, duplicate metadata kinds,
    /// or an input schema that does not match persisted state.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error(
        "Unsupported format version: written {written}, readable by {readable}; \
         this build reads {read_back}..={current}"
    )]
    Version {
        written: u32,
        readable: u32,
        read_back: u32,
        current: u32,
    },

    #[error("Type mismatch on column {column}: expected {expected}, found {actual}")]
    TypeMismatch {
        column: usize,
        expected: DataType,
        actual: DataType,
    },

    #[error("Unexpected null on column {column}")]
    UnexpectedNull { column: usize },

    #[error("Column {column} has no metadata of kind '{kind}'")]
    MissingMetadata { column: usize, kind: String },

    /// Programmer error: inactive column, cursor not on a row, sealed
    /// dispatcher, mis-sized column set.
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}
