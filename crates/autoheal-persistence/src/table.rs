//! ---
//! ah_section: "03-persistence-logging"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Persistence abstractions and storage bindings."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::warn;

use crate::{PersistenceError, Result};

/// Header-addressed view over a CSV file.
///
/// Rows that fail to decode are skipped with a warning instead of failing the
/// whole read, so a single torn line never hides the rest of a log.
#[derive(Debug, Clone, Default)]
pub struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    skipped: usize,
}

impl Table {
    /// Read a CSV file with a header row. A missing file yields `Ok(None)`; a
    /// header that cannot be decoded yields an empty table.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let headers = match reader.headers() {
            Ok(headers) => headers.iter().map(|h| h.trim().to_owned()).collect(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable csv header; treating file as empty");
                return Ok(Some(Self {
                    path: path.to_path_buf(),
                    ..Self::default()
                }));
            }
        };

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record),
                Err(err) => {
                    skipped += 1;
                    warn!(path = %path.display(), error = %err, "skipping malformed csv row");
                }
            }
        }
        Ok(Some(Self {
            path: path.to_path_buf(),
            headers,
            rows,
            skipped,
        }))
    }

    /// Column names from the header row.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Decoded data rows in file order.
    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    /// Number of decoded data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dropped because they could not be decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Whether the header row contains `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Value of `column` in the last data row.
    pub fn last_value(&self, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.last()?.get(index)
    }

    /// Parse the last row's `column` as a number.
    ///
    /// `Ok(None)` when the table is empty, the column is absent or the cell is
    /// blank; an error when the cell holds something that is not a number.
    pub fn last_number(&self, column: &str) -> Result<Option<f64>> {
        match self.last_value(column).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => self.parse_number(column, raw).map(Some),
        }
    }

    /// Parse every non-blank cell of `column` as a number.
    pub fn numbers(&self, column: &str) -> Result<Vec<f64>> {
        let Some(index) = self.column_index(column) else {
            return Ok(Vec::new());
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(index).map(str::trim))
            .filter(|raw| !raw.is_empty())
            .map(|raw| self.parse_number(column, raw))
            .collect()
    }

    fn parse_number(&self, column: &str, raw: &str) -> Result<f64> {
        raw.parse::<f64>()
            .ok()
            .filter(|value| !value.is_nan())
            .ok_or_else(|| PersistenceError::Malformed {
                path: self.path.clone(),
                reason: format!("column '{column}' holds non-numeric value '{raw}'"),
            })
    }
}
