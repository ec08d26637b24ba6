//! Error types for `stratus-io`.

use std::path::PathBuf;

use stratus_recon::schema::ColumnKind;
use stratus_recon::ReconError;
use thiserror::Error;

/// CSV encode/decode faults, independent of any file path.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Header row does not match the relation schema.
    #[error("header mismatch: expected {expected:?}, found {found:?}")]
    Header {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A cell failed typed decoding against its declared column kind.
    #[error("row {row}: column '{column}': cannot parse {value:?} as {kind}")]
    Value {
        row: usize,
        column: String,
        value: String,
        kind: ColumnKind,
    },

    #[error(transparent)]
    Shape(#[from] ReconError),
}

/// Store faults with file context. Absence of prior state is not an error;
/// `load` reports it as `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("{}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}
