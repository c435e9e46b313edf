// src/pipeline.rs
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::catalogue::{Field, Statement};
use crate::config::PipelineConfig;
use crate::document::{discover, read_document, Document, DocumentFile, Page, ReportType};
use crate::extractors::chain::ExtractionChain;
use crate::extractors::grid::ScoredGrid;
use crate::extractors::locator::{locate, Rubric};
use crate::extractors::secondary::SecondaryExtractor;
use crate::output::{ExtractionResult, OutputTable};
use crate::utils::debug_dump;
use crate::utils::error::{AppError, ExtractError};
use crate::validation::{validate, CheckResult};

/// Where a statement was found, or why it was not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedStatement {
    pub statement: Statement,
    pub page: Option<u32>,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub file: String,
    pub year: u32,
    pub report_type: ReportType,
    pub located: Vec<LocatedStatement>,
    pub resolved: usize,
    pub total: usize,
    pub result: ExtractionResult,
    pub checks: Vec<CheckResult>,
}

impl DocumentOutcome {
    pub fn page_for(&self, statement: Statement) -> Option<u32> {
        self.located
            .iter()
            .find(|located| located.statement == statement)
            .and_then(|located| located.page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub skipped: Vec<SkippedDocument>,
    pub table: OutputTable,
}

impl RunReport {
    /// Per-year field counts and identity results, then the overall fill ratio.
    pub fn log_summary(&self) {
        for outcome in &self.outcomes {
            tracing::info!(
                "{} ({}): resolved {}/{} fields",
                outcome.year,
                outcome.report_type,
                outcome.resolved,
                outcome.total
            );
            for check in &outcome.checks {
                if check.failed() {
                    tracing::warn!("  {}", check);
                } else {
                    tracing::info!("  {}", check);
                }
            }
        }
        for skipped in &self.skipped {
            tracing::warn!("Skipped {}: {}", skipped.file, skipped.reason);
        }
        tracing::info!(
            "Table has {} year(s), {:.1}% of field cells filled",
            self.table.len(),
            self.table.filled_ratio() * 100.0
        );
    }
}

/// Sequential batch pipeline over report documents.
pub struct Pipeline {
    config: PipelineConfig,
    balance_sheet: ExtractionChain,
    key_ratios: ExtractionChain,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, AppError> {
        let secondary = match &config.secondary {
            Some(secondary_config) => match SecondaryExtractor::from_config(secondary_config) {
                Ok(extractor) => Some(extractor),
                Err(e) => {
                    tracing::warn!("Secondary extraction unavailable: {}", e);
                    None
                }
            },
            None => None,
        };
        Self::with_secondary(config, secondary)
    }

    /// Builds the pipeline around an already constructed secondary extractor (or none).
    pub fn with_secondary(
        config: PipelineConfig,
        secondary: Option<SecondaryExtractor>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let secondary = secondary.map(Arc::new);
        let balance_sheet = ExtractionChain::balance_sheet(secondary.clone());
        let key_ratios = ExtractionChain::key_ratios(secondary);
        tracing::debug!(
            "Balance sheet chain: {:?}; key ratios chain: {:?}",
            balance_sheet.strategy_names(),
            key_ratios.strategy_names()
        );
        Ok(Self {
            config,
            balance_sheet,
            key_ratios,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Discovers the PDFs in `dir` and runs the batch over them.
    pub async fn run_dir(&self, dir: &Path) -> Result<RunReport, AppError> {
        let files = discover(dir)?;
        if files.is_empty() {
            return Err(AppError::NoDocuments(dir.display().to_string()));
        }
        self.run(&files).await
    }

    pub async fn run(&self, files: &[DocumentFile]) -> Result<RunReport, AppError> {
        if files.is_empty() {
            return Err(AppError::NoDocuments("empty input set".to_string()));
        }

        let mut skipped = Vec::new();
        let mut documents = Vec::new();
        for file in files {
            let name = file.path.display().to_string();
            if !self.config.report_types.allows(file.report_type) {
                tracing::debug!("Skipping {} ({} reports are not enabled)", name, file.report_type);
                continue;
            }
            match read_document(&file.path, file.year, file.report_type) {
                Ok(document) => documents.push(document),
                Err(e) => {
                    tracing::warn!("Could not read {}: {}", name, e);
                    skipped.push(SkippedDocument {
                        file: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let available = documents.iter().map(|document| document.year).collect::<Vec<_>>();
        let years = self.config.years.apply(&available);
        documents.retain(|document| years.contains(&document.year));
        if documents.is_empty() {
            return Err(AppError::NoDocuments(
                "no readable documents match the configured report types and years".to_string(),
            ));
        }
        tracing::info!("Processing {} document(s) for year(s) {:?}", documents.len(), years);

        let mut outcomes = Vec::new();
        let mut table = OutputTable::new(self.config.schema.clone());
        for document in &documents {
            let outcome = self.process_document(document).await;
            if outcome.result.is_empty() {
                tracing::warn!("No fields found in {}; result discarded", outcome.file);
            } else {
                table.insert(outcome.year, &outcome.result);
            }
            outcomes.push(outcome);
        }

        if table.is_empty() {
            return Err(AppError::Processing(format!(
                "none of the {} document(s) yielded any field",
                documents.len()
            )));
        }

        Ok(RunReport {
            outcomes,
            skipped,
            table,
        })
    }

    /// Locates both statements, runs their chains, and validates. Never fails:
    /// problems are logged and show up as absent fields.
    pub async fn process_document(&self, document: &Document) -> DocumentOutcome {
        tracing::info!("Processing {} (year {})", document.file_name(), document.year);
        let mut result = ExtractionResult::default();
        let mut located = Vec::new();

        for chain in [&self.balance_sheet, &self.key_ratios] {
            let statement = chain.statement();
            let rubric = Rubric::for_statement(statement);
            match locate(&document.pages, &rubric) {
                Ok(found) => {
                    located.push(LocatedStatement {
                        statement,
                        page: Some(found.page),
                        score: found.score,
                        error: None,
                    });
                    if let Some(page) = document.page(found.page) {
                        let grid = chain.run(page, &mut result).await;
                        self.dump_debug(document.year, statement, page, grid.as_ref());
                    }
                }
                Err(e) => {
                    tracing::warn!("{}: {}", document.file_name(), e);
                    let best_score = match &e {
                        ExtractError::PageNotFound { best_score, .. } => *best_score,
                        _ => 0,
                    };
                    located.push(LocatedStatement {
                        statement,
                        page: None,
                        score: best_score,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let checks = validate(&result, self.config.reconciliation_tolerance);
        let outcome = DocumentOutcome {
            file: document.file_name(),
            year: document.year,
            report_type: document.report_type,
            located,
            resolved: result.len(),
            total: Field::ALL.len(),
            result,
            checks,
        };
        tracing::info!(
            "{}: resolved {}/{} fields",
            outcome.file,
            outcome.resolved,
            outcome.total
        );
        outcome
    }

    fn dump_debug(&self, year: u32, statement: Statement, page: &Page, grid: Option<&ScoredGrid>) {
        let Some(dir) = &self.config.debug_dir else {
            return;
        };
        let label = statement.name().replace(' ', "_");
        if let Err(e) = debug_dump::save_page_lines(dir, year, &label, page) {
            tracing::warn!("Could not write debug page lines: {}", e);
        }
        if let Some(selected) = grid {
            if let Err(e) = debug_dump::save_grid(dir, year, &label, page.number, selected) {
                tracing::warn!("Could not write debug grid: {}", e);
            }
        }
    }
}
