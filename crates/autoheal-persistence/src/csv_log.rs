//! ---
//! ah_section: "03-persistence-logging"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Persistence abstractions and storage bindings."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use parking_lot::Mutex;
use tracing::debug;

use crate::table::Table;
use crate::{PersistenceError, Result};

/// Append-only CSV log with a mandatory header row.
///
/// Every record is encoded into a buffer first and written with a single
/// `write_all` on an append-mode handle while the log's mutex is held, so
/// concurrent appenders sharing the handle never interleave partial rows.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    headers: Vec<String>,
    write_lock: Mutex<()>,
}

impl CsvLog {
    /// Open a log for appending, writing the header if the file is new or empty.
    pub fn open(path: impl AsRef<Path>, headers: &[&str]) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let log = Self {
            path: path.to_path_buf(),
            headers: headers.iter().map(|h| (*h).to_owned()).collect(),
            write_lock: Mutex::new(()),
        };

        if !path.exists() || fs::metadata(path)?.len() == 0 {
            let header = encode(&log.headers)?;
            log.write_bytes(&header)?;
            debug!(path = %path.display(), "initialised log with header");
        }
        Ok(log)
    }

    /// Append one record and return the number of bytes written.
    pub fn append<I, S>(&self, record: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = record.into_iter().map(Into::into).collect();
        if fields.len() != self.headers.len() {
            return Err(PersistenceError::FieldCount {
                path: self.path.clone(),
                expected: self.headers.len(),
                actual: fields.len(),
            });
        }
        let bytes = encode(&fields)?;
        self.write_bytes(&bytes)?;
        Ok(bytes.len())
    }

    /// Read the whole log back, header included.
    pub fn read(&self) -> Result<Table> {
        Ok(Table::read(&self.path)?.unwrap_or_default())
    }

    /// Number of data rows currently in the log.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Whether the log holds no data rows.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Column names written as the header row.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Location of the log on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        Ok(())
    }
}

fn encode(fields: &[String]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|err| PersistenceError::Io(err.into_error()))
}
