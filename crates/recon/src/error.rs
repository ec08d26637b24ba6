//! Error types for `stratus-recon`.
//!
//! Every fault here is fatal for the run: the engine never suppresses an
//! error that would leave the five relations mutually inconsistent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// The input document is not valid JSON.
    #[error("snapshot document is not valid JSON: {0}")]
    Document(#[from] serde_json::Error),

    /// The document root must be an object keyed by record id.
    #[error("snapshot document root must be a JSON object keyed by record id")]
    DocumentShape,

    /// One record failed schema validation (missing/mistyped field).
    #[error("record '{record}': {message}")]
    Record { record: String, message: String },

    /// A record carries a `tz_id` not present in the IANA table.
    #[error("record '{record}': unknown timezone '{tz_id}'")]
    UnknownTimezone { record: String, tz_id: String },

    /// The local observation time does not exist in its timezone
    /// (falls into a DST gap).
    #[error("record '{record}': local time {timestamp} does not exist in timezone '{tz_id}'")]
    InvalidLocalTime {
        record: String,
        tz_id: String,
        timestamp: String,
    },

    /// A relation handed to the engine lacks a required column.
    #[error("relation '{relation}': missing column '{column}'")]
    MissingColumn { relation: String, column: String },

    /// A business-key column holds a null.
    #[error("relation '{relation}': null in key column '{column}'")]
    NullKey { relation: String, column: String },

    /// Row width does not match the relation's column count.
    #[error("row has {got} values, relation has {expected} columns")]
    RowWidth { expected: usize, got: usize },
}
