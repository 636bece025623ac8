// src/sink/csv.rs
//! Per-city CSV appender.
//!
//! The header is fixed when the file is created. Later rows are laid out
//! against that header by column name: hospitals missing from an observation
//! get an empty cell, hospitals the header doesn't know are dropped (and
//! logged). The header never grows, so hospitals added upstream after file
//! creation are only recorded by the Mongo sink.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::ObservationSink;
use crate::city::City;
use crate::observation::Observation;

#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, city: City) -> PathBuf {
        self.dir.join(city.csv_file_name())
    }
}

/// Appends one row; writes the header first if the file is new or empty.
/// Returns the number of observation fields the header had no column for.
pub fn append_observation(path: &Path, obs: &Observation) -> Result<usize> {
    let existing = read_header(path)?;
    let fresh = existing.is_none();
    let header: Vec<String> = match existing {
        Some(h) => h,
        None => obs.field_names().into_iter().map(str::to_string).collect(),
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut w = ::csv::Writer::from_writer(file);
    if fresh {
        w.write_record(&header).context("write csv header")?;
    }
    let row: Vec<String> = header.iter().map(|f| obs.csv_cell(f)).collect();
    w.write_record(&row).context("write csv row")?;
    w.flush().context("flush csv")?;

    let dropped = obs
        .field_names()
        .into_iter()
        .filter(|f| !header.iter().any(|h| h == f))
        .count();
    Ok(dropped)
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut first = ::csv::StringRecord::new();
    if !rdr.read_record(&mut first).context("read csv header")? {
        return Ok(None);
    }
    Ok(Some(first.iter().map(str::to_string).collect()))
}

#[async_trait::async_trait]
impl ObservationSink for CsvSink {
    async fn persist(&self, city: City, obs: &Observation) -> Result<()> {
        let path = self.path_for(city);
        let obs = obs.clone();
        let dropped = tokio::task::spawn_blocking(move || append_observation(&path, &obs))
            .await
            .context("csv writer task")??;
        if dropped > 0 {
            tracing::warn!(
                target: "sink",
                %city,
                dropped,
                "csv header predates some hospitals; their values were not written"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
