// src/storage/reference.rs
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::extractors::parse_number;
use crate::output::OutputTable;
use crate::utils::error::StorageError;

// Relative tolerance for numeric cells; anything closer is float noise.
const RELATIVE_TOLERANCE: f64 = 1e-5;
const ABSOLUTE_TOLERANCE: f64 = 1e-8;

/// A hand-maintained table in the output format: identifier row, label row, then data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    ids: Vec<String>,
    rows: BTreeMap<u32, Vec<String>>,
}

impl ReferenceTable {
    pub fn read(path: &Path) -> Result<Self, StorageError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut records = reader.records();
        let ids = match records.next() {
            Some(record) => record?.iter().map(|cell| cell.trim().to_string()).collect(),
            None => {
                return Err(StorageError::Reference(format!("{} is empty", path.display())));
            }
        };
        // Label row
        records.next().transpose()?;

        let mut rows = BTreeMap::new();
        for record in records {
            let record = record?;
            let Some(year) = record.get(0).and_then(parse_year) else {
                continue;
            };
            rows.insert(year, record.iter().map(|cell| cell.trim().to_string()).collect());
        }
        tracing::debug!("Reference table {} has {} year(s)", path.display(), rows.len());
        Ok(Self { ids, rows })
    }

    /// Cell for a column identifier, falling back to the column position when the
    /// reference does not carry that identifier.
    fn cell(&self, year: u32, id: &str, position: usize) -> Option<&str> {
        let row = self.rows.get(&year)?;
        let index = self
            .ids
            .iter()
            .position(|candidate| !candidate.is_empty() && candidate == id)
            .unwrap_or(position);
        row.get(index).map(String::as_str)
    }

    pub fn has_year(&self, year: u32) -> bool {
        self.rows.contains_key(&year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub column: usize,
    pub id: String,
    pub label: String,
    pub generated: Option<String>,
    pub reference: Option<String>,
}

/// Compares one year of `table` against the reference file. Both-empty cells match; numeric
/// cells match within a small relative tolerance; empty against present is a discrepancy.
pub fn compare_with_reference(
    table: &OutputTable,
    path: &Path,
    year: u32,
) -> Result<Vec<Discrepancy>, StorageError> {
    let reference = ReferenceTable::read(path)?;
    if table.row(year).is_none() {
        return Err(StorageError::Reference(format!("year {} not found in the generated table", year)));
    }
    if !reference.has_year(year) {
        return Err(StorageError::Reference(format!(
            "year {} not found in {}",
            year,
            path.display()
        )));
    }

    let mut discrepancies = Vec::new();
    for (position, column) in table.schema().columns().iter().enumerate() {
        let Some(field) = column.field else {
            continue;
        };
        let generated = table.value(year, field).map(|value| value.to_string());
        let expected = reference.cell(year, column.id, position).and_then(non_empty);

        if !cells_match(generated.as_deref(), expected) {
            discrepancies.push(Discrepancy {
                column: position,
                id: column.id.to_string(),
                label: column.label.to_string(),
                generated,
                reference: expected.map(str::to_string),
            });
        }
    }

    if discrepancies.is_empty() {
        tracing::info!("All {} values for {} match the reference", table.schema().len() - 1, year);
    } else {
        tracing::warn!("{} discrepancies against the reference for {}", discrepancies.len(), year);
    }
    Ok(discrepancies)
}

fn parse_year(cell: &str) -> Option<u32> {
    cell.trim().split('.').next()?.parse().ok()
}

fn non_empty(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed == "-" {
        None
    } else {
        Some(trimmed)
    }
}

fn cells_match(generated: Option<&str>, expected: Option<&str>) -> bool {
    match (generated, expected) {
        (None, None) => true,
        (Some(a), Some(b)) => match (parse_number(a, true), parse_number(b, true)) {
            (Some(x), Some(y)) => {
                let (x, y) = (x.as_f64(), y.as_f64());
                (x - y).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * y.abs()
            }
            _ => a.trim() == b.trim(),
        },
        _ => false,
    }
}
