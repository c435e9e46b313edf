// src/output.rs
use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalogue::{Field, OutputSchema, Statement};
use crate::extractors::Value;

/// Which strategy produced a value, from which page, and how confident it was.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub strategy: &'static str,
    pub page: u32,
    pub confidence: i32,
}

/// Field values for one document. A populated field is never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    values: BTreeMap<Field, Value>,
    provenance: BTreeMap<Field, Provenance>,
}

impl ExtractionResult {
    /// Records `value` unless the field is already populated. Returns whether it was recorded.
    pub fn record(&mut self, field: Field, value: Value, provenance: Provenance) -> bool {
        if self.values.contains_key(&field) {
            return false;
        }
        self.values.insert(field, value);
        self.provenance.insert(field, provenance);
        true
    }

    pub fn get(&self, field: Field) -> Option<Value> {
        self.values.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn provenance(&self, field: Field) -> Option<&Provenance> {
        self.provenance.get(&field)
    }

    /// Fields of `statement` still unpopulated, in output order.
    pub fn missing(&self, statement: Statement) -> Vec<Field> {
        statement
            .fields()
            .into_iter()
            .filter(|field| !self.contains(*field))
            .collect()
    }

    pub fn values(&self) -> &BTreeMap<Field, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One reporting year projected onto the schema. `cells` follows the schema's field
/// columns (everything after the year column); absent fields stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub year: u32,
    pub cells: Vec<Option<Value>>,
}

impl OutputRow {
    pub fn project(year: u32, result: &ExtractionResult, schema: &OutputSchema) -> Self {
        let cells = schema
            .columns()
            .iter()
            .skip(1)
            .map(|column| column.field.and_then(|field| result.get(field)))
            .collect();
        Self { year, cells }
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

/// Final table: one row per distinct year, iterated in ascending year order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputTable {
    schema: OutputSchema,
    rows: BTreeMap<u32, OutputRow>,
}

impl OutputTable {
    pub fn new(schema: OutputSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    /// Projects `result` as the row for `year`. A later document for the same year replaces
    /// the earlier row outright; returns whether that happened.
    pub fn insert(&mut self, year: u32, result: &ExtractionResult) -> bool {
        let row = OutputRow::project(year, result, &self.schema);
        let replaced = self.rows.insert(year, row).is_some();
        if replaced {
            tracing::warn!("Year {} appeared twice; keeping the later document", year);
        }
        replaced
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn rows(&self) -> impl Iterator<Item = &OutputRow> {
        self.rows.values()
    }

    pub fn row(&self, year: u32) -> Option<&OutputRow> {
        self.rows.get(&year)
    }

    pub fn years(&self) -> Vec<u32> {
        self.rows.keys().copied().collect()
    }

    pub fn value(&self, year: u32, field: Field) -> Option<Value> {
        let position = self.schema.position(field)?;
        self.rows.get(&year)?.cells.get(position - 1).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Share of field cells holding a value, across all rows.
    pub fn filled_ratio(&self) -> f64 {
        let total = self.rows.len() * (self.schema.len().saturating_sub(1));
        if total == 0 {
            return 0.0;
        }
        let filled = self.rows.values().map(OutputRow::filled).sum::<usize>();
        filled as f64 / total as f64
    }
}

/// Builds the table from `(year, result)` pairs in processing order.
pub fn assemble<'a>(
    results: impl IntoIterator<Item = (u32, &'a ExtractionResult)>,
    schema: OutputSchema,
) -> OutputTable {
    let mut table = OutputTable::new(schema);
    for (year, result) in results {
        table.insert(year, result);
    }
    table
}
