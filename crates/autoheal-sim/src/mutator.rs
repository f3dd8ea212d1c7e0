//! ---
//! ah_section: "11-simulation"
//! ah_subsection: "module"
//! ah_type: "source"
//! ah_scope: "code"
//! ah_description: "Simulation runtime helpers and deployment fleet."
//! ah_version: "v0.0.0-prealpha"
//! ah_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use autoheal_common::{DatasetConfig, DatasetKind};
use autoheal_resilience::detector::{HEART_RATE_COLUMN, OXYGEN_COLUMN, SCORE_COLUMN};
use autoheal_resilience::DatasetMutator;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Dataset mutator that snapshots the dataset and, on request, corrupts it.
///
/// The first mutation copies the dataset to its backup path so a restore has
/// something to go back to. A forced anomaly rewrites every score far below any
/// sane threshold, or appends a vital-signs record with an abnormal reading.
#[derive(Debug)]
pub struct AnomalyInjector {
    rng: Mutex<StdRng>,
}

impl AnomalyInjector {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn ensure_backup(&self, dataset: &DatasetConfig) -> Result<()> {
        let backup = dataset.backup_path();
        if backup.exists() {
            return Ok(());
        }
        fs::copy(&dataset.path, &backup).with_context(|| {
            format!("unable to back up {} to {}", dataset.label(), backup.display())
        })?;
        debug!(dataset = %dataset.label(), backup = %backup.display(), "dataset backed up");
        Ok(())
    }

    fn depress_scores(&self, headers: &StringRecord, rows: &mut [StringRecord]) -> Result<()> {
        let column = column_index(headers, SCORE_COLUMN)?;
        let mut rng = self.rng.lock();
        for row in rows.iter_mut() {
            let value = rng.gen_range(10..=35_u32).to_string();
            *row = replace_field(row, column, &value);
        }
        Ok(())
    }

    fn abnormal_vitals(&self, headers: &StringRecord, rows: &mut Vec<StringRecord>) -> Result<()> {
        let template = match rows.last() {
            Some(last) => last.clone(),
            None => headers.iter().map(|_| "").collect(),
        };
        let mut rng = self.rng.lock();
        let record = if rng.gen_bool(0.5) {
            let column = column_index(headers, HEART_RATE_COLUMN)?;
            replace_field(&template, column, &rng.gen_range(130..=160_u32).to_string())
        } else {
            let column = column_index(headers, OXYGEN_COLUMN)?;
            replace_field(&template, column, &rng.gen_range(85..=92_u32).to_string())
        };
        rows.push(record);
        Ok(())
    }
}

impl Default for AnomalyInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetMutator for AnomalyInjector {
    fn mutate(&self, dataset: &DatasetConfig, force_anomaly: bool) -> Result<()> {
        if !dataset.path.exists() {
            return Err(anyhow!("dataset {} does not exist", dataset.label()));
        }
        self.ensure_backup(dataset)?;
        if !force_anomaly || dataset.kind == DatasetKind::Unmonitored {
            return Ok(());
        }

        let (headers, mut rows) = read_dataset(&dataset.path)?;
        match dataset.kind {
            DatasetKind::Scores => self.depress_scores(&headers, &mut rows)?,
            DatasetKind::Health => self.abnormal_vitals(&headers, &mut rows)?,
            DatasetKind::Unmonitored => {}
        }
        write_dataset(&dataset.path, &headers, &rows)?;
        info!(
            target: "autoheal::sim::mutator",
            dataset = %dataset.label(),
            kind = dataset.kind.as_str(),
            "anomaly injected"
        );
        Ok(())
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("dataset has no '{}' column", name))
}

fn replace_field(record: &StringRecord, column: usize, value: &str) -> StringRecord {
    let mut fields: Vec<&str> = record.iter().collect();
    if fields.len() <= column {
        fields.resize(column + 1, "");
    }
    fields[column] = value;
    fields.into_iter().collect()
}

fn read_dataset(path: &Path) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("unable to open {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("unable to read {}", path.display()))?;
    Ok((headers, rows))
}

fn write_dataset(path: &Path, headers: &StringRecord, rows: &[StringRecord]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let file =
            File::create(&tmp).with_context(|| format!("unable to create {}", tmp.display()))?;
        let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
        writer.write_record(headers)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("unable to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scores_are_depressed_and_backup_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("student_scores.csv");
        fs::write(&path, "name,score\na,80\nb,95\n").unwrap();
        let dataset = DatasetConfig::new(&path, DatasetKind::Scores);

        AnomalyInjector::new().with_seed(5).mutate(&dataset, true).unwrap();

        assert_eq!(
            fs::read_to_string(dataset.backup_path()).unwrap(),
            "name,score\na,80\nb,95\n"
        );
        let (_, rows) = read_dataset(&path).unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            let score: u32 = row.get(1).unwrap().parse().unwrap();
            assert!((10..=35).contains(&score));
        }
    }

    #[test]
    fn health_gets_an_abnormal_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patient_health.csv");
        fs::write(&path, "patient_id,heart_rate,oxygen_level\np1,72,98\n").unwrap();
        let dataset = DatasetConfig::new(&path, DatasetKind::Health);

        AnomalyInjector::new().with_seed(9).mutate(&dataset, true).unwrap();

        let (_, rows) = read_dataset(&path).unwrap();
        assert_eq!(rows.len(), 2);
        let last = &rows[1];
        assert_eq!(last.get(0), Some("p1"));
        let heart: u32 = last.get(1).unwrap().parse().unwrap();
        let oxygen: u32 = last.get(2).unwrap().parse().unwrap();
        assert!(heart >= 130 || oxygen <= 92);
    }

    #[test]
    fn without_force_only_backs_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("student_scores.csv");
        fs::write(&path, "score\n70\n").unwrap();
        let dataset = DatasetConfig::new(&path, DatasetKind::Scores);

        AnomalyInjector::new().mutate(&dataset, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "score\n70\n");
        assert!(dataset.backup_path().exists());
    }

    #[test]
    fn missing_dataset_is_an_error() {
        let dir = tempdir().unwrap();
        let dataset = DatasetConfig::new(dir.path().join("absent.csv"), DatasetKind::Scores);
        assert!(AnomalyInjector::new().mutate(&dataset, true).is_err());
    }
}
