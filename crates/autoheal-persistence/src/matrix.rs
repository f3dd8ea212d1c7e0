//! ---
//! ah_section: "03-persistence-logging"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Persistence abstractions and storage bindings."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use tracing::warn;

use crate::Result;

/// Row label → column label → value, in file order.
pub type LabeledMatrix = IndexMap<String, IndexMap<String, f64>>;

/// Load a labelled matrix stored as CSV.
///
/// The header row is `<corner>,<column>...`; every following row is
/// `<row label>,<value>...`. Cells that are blank or not numeric are left out
/// of the returned map (with a warning) so callers can backfill them. A
/// missing file, or one whose header cannot be decoded, yields `Ok(None)`.
pub fn load_matrix(path: &Path) -> Result<Option<LabeledMatrix>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let columns: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().skip(1).map(|h| h.trim().to_owned()).collect(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable matrix header; ignoring file");
            return Ok(None);
        }
    };

    let mut matrix = LabeledMatrix::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed matrix row");
                continue;
            }
        };
        let Some(label) = record.get(0).map(str::trim).filter(|l| !l.is_empty()) else {
            warn!(path = %path.display(), "skipping matrix row without a label");
            continue;
        };
        let row = matrix.entry(label.to_owned()).or_default();
        for (column, raw) in columns.iter().zip(record.iter().skip(1)) {
            match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    row.insert(column.clone(), value);
                }
                _ => warn!(
                    path = %path.display(),
                    row = label,
                    column = %column,
                    raw,
                    "ignoring non-numeric matrix cell"
                ),
            }
        }
    }
    Ok(Some(matrix))
}

/// Persist a labelled matrix, replacing the file atomically.
///
/// Columns are written in first-seen order across all rows; absent cells are
/// written as `0`.
pub fn save_matrix(path: &Path, matrix: &LabeledMatrix) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut columns: Vec<&str> = Vec::new();
    for row in matrix.values() {
        for column in row.keys() {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
    }

    let staging = path.with_extension("tmp");
    {
        let file = BufWriter::new(File::create(&staging)?);
        let mut writer = WriterBuilder::new().from_writer(file);
        let mut header = vec![""];
        header.extend(columns.iter().copied());
        writer.write_record(&header)?;
        for (label, row) in matrix {
            let mut record = vec![label.clone()];
            record.extend(
                columns
                    .iter()
                    .map(|column| row.get(*column).copied().unwrap_or(0.0).to_string()),
            );
            writer.write_record(&record)?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|err| crate::PersistenceError::Io(err.into_error()))?;
        file.flush()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}
