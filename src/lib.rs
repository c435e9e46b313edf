// src/lib.rs
//! Balance-sheet and key-ratio extraction from AP2 fund report PDFs.

pub mod catalogue;
pub mod config;
pub mod document;
pub mod extractors;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod utils;
pub mod validation;

pub use catalogue::{Field, OutputSchema, Statement};
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunReport};
pub use utils::AppError;
