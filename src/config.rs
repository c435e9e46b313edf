// src/config.rs
use serde::Serialize;
use std::path::PathBuf;

use crate::catalogue::OutputSchema;
use crate::document::ReportType;
use crate::utils::error::AppError;
use crate::validation::DEFAULT_TOLERANCE;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3.1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which reporting years to process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum YearSelection {
    #[default]
    All,
    /// Only the most recent year present in the input.
    Latest,
    Years(Vec<u32>),
}

impl YearSelection {
    /// Narrows the available years (ascending, deduplicated) to the selection.
    pub fn apply(&self, available: &[u32]) -> Vec<u32> {
        let mut years = available.to_vec();
        years.sort_unstable();
        years.dedup();
        match self {
            YearSelection::All => years,
            YearSelection::Latest => years.last().copied().into_iter().collect(),
            YearSelection::Years(wanted) => years.into_iter().filter(|year| wanted.contains(year)).collect(),
        }
    }
}

/// Enabled statement-type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportTypes {
    pub annual: bool,
    pub half_year: bool,
    pub year_end: bool,
}

impl Default for ReportTypes {
    fn default() -> Self {
        Self {
            annual: false,
            half_year: true,
            year_end: false,
        }
    }
}

impl ReportTypes {
    pub fn allows(&self, report_type: ReportType) -> bool {
        match report_type {
            ReportType::Annual => self.annual,
            ReportType::HalfYear => self.half_year,
            ReportType::YearEnd => self.year_end,
        }
    }

    pub fn any(&self) -> bool {
        self.annual || self.half_year || self.year_end
    }
}

/// Hosted model used as the last strategy in each chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecondaryConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Everything the pipeline needs, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub years: YearSelection,
    pub report_types: ReportTypes,
    pub schema: OutputSchema,
    pub reconciliation_tolerance: f64,
    /// `None` disables the secondary service.
    pub secondary: Option<SecondaryConfig>,
    pub debug_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            years: YearSelection::default(),
            report_types: ReportTypes::default(),
            schema: OutputSchema::standard(),
            reconciliation_tolerance: DEFAULT_TOLERANCE,
            secondary: None,
            debug_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.report_types.any() {
            return Err(AppError::Config("at least one report type must be enabled".to_string()));
        }
        if matches!(&self.years, YearSelection::Years(years) if years.is_empty()) {
            return Err(AppError::Config("explicit year list is empty".to_string()));
        }
        if !self.reconciliation_tolerance.is_finite() || self.reconciliation_tolerance < 0.0 {
            return Err(AppError::Config(format!(
                "invalid reconciliation tolerance {}",
                self.reconciliation_tolerance
            )));
        }
        if let Some(secondary) = &self.secondary {
            if secondary.timeout_secs == 0 {
                return Err(AppError::Config("secondary service timeout must be positive".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_selection_filters_available_years() {
        let available = [2024, 2022, 2023, 2024];
        assert_eq!(YearSelection::All.apply(&available), vec![2022, 2023, 2024]);
        assert_eq!(YearSelection::Latest.apply(&available), vec![2024]);
        assert_eq!(YearSelection::Years(vec![2023, 2019]).apply(&available), vec![2023]);
        assert!(YearSelection::Latest.apply(&[]).is_empty());
    }

    #[test]
    fn validate_rejects_empty_selections() {
        assert!(PipelineConfig::default().validate().is_ok());

        let no_types = PipelineConfig {
            report_types: ReportTypes {
                annual: false,
                half_year: false,
                year_end: false,
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(no_types.validate(), Err(AppError::Config(_))));

        let no_years = PipelineConfig {
            years: YearSelection::Years(Vec::new()),
            ..PipelineConfig::default()
        };
        assert!(matches!(no_years.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn report_type_flags() {
        let types = ReportTypes::default();
        assert!(types.allows(ReportType::HalfYear));
        assert!(!types.allows(ReportType::Annual));
    }
}
