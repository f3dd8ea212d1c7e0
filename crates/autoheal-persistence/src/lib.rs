//! ---
//! ah_section: "03-persistence-logging"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Persistence abstractions and storage bindings."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
#![warn(missing_docs)]

use std::path::PathBuf;

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors encountered while reading/writing persistence files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for CSV encoding or decoding issues.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// A record did not match the column layout of its log.
    #[error("record for {path} has {actual} fields, expected {expected}")]
    FieldCount {
        /// Log the record was destined for.
        path: PathBuf,
        /// Number of header columns.
        expected: usize,
        /// Number of fields supplied.
        actual: usize,
    },
    /// A value could not be interpreted.
    #[error("malformed record in {path}: {reason}")]
    Malformed {
        /// File holding the offending value.
        path: PathBuf,
        /// Human-readable description of the problem.
        reason: String,
    },
}

pub mod csv_log;
pub mod matrix;
pub mod table;

pub use csv_log::CsvLog;
pub use matrix::{load_matrix, save_matrix, LabeledMatrix};
pub use table::Table;
