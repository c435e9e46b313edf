// src/storage/mod.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalogue::CATALOGUE_VERSION;
use crate::output::OutputTable;
use crate::pipeline::RunReport;
use crate::utils::error::StorageError;

pub mod reference;

pub use reference::{compare_with_reference, Discrepancy};

const LATEST_DIR: &str = "latest";
const TABLE_PREFIX: &str = "AP2_Financial_Data";

/// Files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRun {
    pub run_dir: PathBuf,
    pub table: PathBuf,
    pub latest_table: PathBuf,
    pub metadata: PathBuf,
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Writes the table into a timestamped run folder and into `latest/`, plus run metadata.
    pub fn save_run(&self, report: &RunReport) -> Result<SavedRun, StorageError> {
        let timestamp = chrono::Utc::now();
        let stamp = timestamp.format("%Y%m%d_%H%M%S").to_string();

        let run_dir = self.base_dir.join(&stamp);
        let latest_dir = self.base_dir.join(LATEST_DIR);
        fs::create_dir_all(&run_dir).map_err(StorageError::IoError)?;
        fs::create_dir_all(&latest_dir).map_err(StorageError::IoError)?;

        let table = run_dir.join(format!("{}_{}.csv", TABLE_PREFIX, stamp));
        let latest_table = latest_dir.join(format!("{}_latest.csv", TABLE_PREFIX));
        for path in [&table, &latest_table] {
            let file = fs::File::create(path).map_err(StorageError::IoError)?;
            write_table_csv(&report.table, file)?;
            tracing::info!("Saved table to {}", path.display());
        }

        let metadata = run_dir.join("run_metadata.json");
        let document = serde_json::json!({
            "run_timestamp": timestamp.to_rfc3339(),
            "catalogue_version": CATALOGUE_VERSION,
            "years": report.table.years(),
            "filled_ratio": report.table.filled_ratio(),
            "documents": report.outcomes,
            "skipped": report.skipped,
        });
        let metadata_str = serde_json::to_string_pretty(&document)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&metadata, metadata_str).map_err(StorageError::IoError)?;
        tracing::info!("Saved metadata to {}", metadata.display());

        Ok(SavedRun {
            run_dir,
            table,
            latest_table,
            metadata,
        })
    }
}

/// Two header rows (technical identifiers, then labels; blank for the year column),
/// then one row per year. Absent values are empty cells.
pub fn write_table_csv<W: Write>(table: &OutputTable, writer: W) -> Result<(), StorageError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let columns = table.schema().columns();

    csv_writer.write_record(columns.iter().map(|column| column.id))?;
    csv_writer.write_record(columns.iter().map(|column| column.label))?;
    for row in table.rows() {
        let mut record = Vec::with_capacity(columns.len());
        record.push(row.year.to_string());
        record.extend(
            row.cells
                .iter()
                .map(|cell| cell.map(|value| value.to_string()).unwrap_or_default()),
        );
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush().map_err(StorageError::IoError)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Field, OutputSchema};
    use crate::extractors::Value;
    use crate::output::{ExtractionResult, Provenance};

    fn sample_table() -> OutputTable {
        let mut result = ExtractionResult::default();
        let provenance = Provenance {
            strategy: "test",
            page: 1,
            confidence: 0,
        };
        result.record(Field::FundCapitalLevel, Value::Decimal(357.9), provenance.clone());
        result.record(Field::TotalAssets, Value::Integer(362_451), provenance);
        let mut table = OutputTable::new(OutputSchema::standard());
        table.insert(2024, &result);
        table
    }

    #[test]
    fn csv_has_two_header_rows_and_blank_absent_cells() {
        let mut buffer = Vec::new();
        write_table_csv(&sample_table(), &mut buffer).expect("csv");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(",AP2.FUNDCAPITALCARRIEDFORWARD.LEVEL.NONE.H.1@AP2,"));
        assert!(lines[1].starts_with(",AP2 semi-annual: Fund capital carried forward,"));
        let cells = lines[2].split(',').collect::<Vec<_>>();
        assert_eq!(cells.len(), 21);
        assert_eq!(cells[0], "2024");
        assert_eq!(cells[1], "357.9");
        assert_eq!(cells[2], "");
        assert_eq!(cells[11], "362451");
    }

    #[test]
    fn save_run_writes_timestamped_and_latest_copies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = StorageManager::new(dir.path().join("output")).expect("storage");
        let report = RunReport {
            outcomes: Vec::new(),
            skipped: Vec::new(),
            table: sample_table(),
        };

        let saved = storage.save_run(&report).expect("saved");
        assert!(saved.table.exists());
        assert!(saved.latest_table.ends_with("latest/AP2_Financial_Data_latest.csv"));
        assert_eq!(
            fs::read_to_string(&saved.table).expect("table"),
            fs::read_to_string(&saved.latest_table).expect("latest")
        );
        let metadata: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&saved.metadata).expect("metadata")).expect("json");
        assert_eq!(metadata["years"], serde_json::json!([2024]));
        assert_eq!(metadata["catalogue_version"], CATALOGUE_VERSION);
    }
}
