// src/main.rs
use std::path::PathBuf;

use ap2_extractor::config::{
    PipelineConfig, ReportTypes, SecondaryConfig, YearSelection, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_TIMEOUT_SECS,
};
use ap2_extractor::storage::{compare_with_reference, StorageManager};
use ap2_extractor::utils::logging;
use ap2_extractor::validation::DEFAULT_TOLERANCE;
use ap2_extractor::{AppError, OutputSchema, Pipeline};
use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Annual,
    HalfYear,
    YearEnd,
}

/// Command Line Interface for the AP2 report extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the downloaded report PDFs
    #[arg(short, long, default_value = "./downloads")]
    input_dir: PathBuf,

    /// Output directory for the table and run metadata
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Reporting years to process (comma separated); all years when omitted
    #[arg(short, long = "year", value_delimiter = ',', conflicts_with = "latest")]
    years: Vec<u32>,

    /// Only process the most recent year found
    #[arg(long)]
    latest: bool,

    /// Report types to process
    #[arg(long, value_enum, value_delimiter = ',', default_value = "half-year")]
    report_types: Vec<ReportKind>,

    /// Allowed difference (SEK million) for the accounting identity checks
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Ask a hosted model for fields the local strategies could not resolve
    #[arg(long, env = "ENABLE_LLM_FALLBACK")]
    llm_fallback: bool,

    /// API key for the hosted model
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Hosted model name
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Chat-completions endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    llm_endpoint: String,

    /// Hosted model timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    llm_timeout: u64,

    /// Debug mode - save located pages and selected grids under <output_dir>/debug
    #[arg(short, long)]
    debug: bool,

    /// Compare the produced table against a reference CSV in the same format
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Verbose logging (debug level unless RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let years = if self.latest {
            YearSelection::Latest
        } else if self.years.is_empty() {
            YearSelection::All
        } else {
            YearSelection::Years(self.years.clone())
        };

        let secondary = self.llm_fallback.then(|| SecondaryConfig {
            endpoint: self.llm_endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone().unwrap_or_default(),
            timeout_secs: self.llm_timeout,
        });

        PipelineConfig {
            years,
            report_types: ReportTypes {
                annual: self.report_types.contains(&ReportKind::Annual),
                half_year: self.report_types.contains(&ReportKind::HalfYear),
                year_end: self.report_types.contains(&ReportKind::YearEnd),
            },
            schema: OutputSchema::standard(),
            reconciliation_tolerance: self.tolerance,
            secondary,
            debug_dir: self.debug.then(|| self.output_dir.join("debug")),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    logging::setup_logging(args.verbose);
    tracing::info!(
        "Starting extraction from {} into {}",
        args.input_dir.display(),
        args.output_dir.display()
    );

    // 3. Build the pipeline from explicit configuration
    let config = args.pipeline_config();
    tracing::debug!("Pipeline configuration: {:?}", config.years);
    let pipeline = Pipeline::new(config)?;

    // 4. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 5. Process every document
    let report = pipeline.run_dir(&args.input_dir).await?;
    report.log_summary();

    // 6. Save the table and run metadata
    let saved = storage.save_run(&report)?;
    tracing::info!("Run saved to {}", saved.run_dir.display());

    // 7. Optional comparison against a reference table
    if let Some(reference) = &args.reference {
        for year in report.table.years() {
            match compare_with_reference(&report.table, reference, year) {
                Ok(discrepancies) => {
                    for d in discrepancies {
                        tracing::warn!(
                            "{} column {} ({}): generated {}, reference {}",
                            year,
                            d.column,
                            d.label,
                            d.generated.as_deref().unwrap_or("-"),
                            d.reference.as_deref().unwrap_or("-")
                        );
                    }
                }
                Err(e) => tracing::warn!("Reference comparison for {} skipped: {}", year, e),
            }
        }
    }

    Ok(())
}
