// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error), // Automatically convert lopdf errors

    #[error("Document has no pages: {0}")]
    Empty(String),

    #[error("Could not determine reporting year for {0}")]
    UnknownYear(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No page cleared the {statement} confidence floor (best score {best_score})")]
    PageNotFound {
        statement: &'static str,
        best_score: i32,
    },

    #[error("No table candidate cleared the confidence floor on page {page} (best score {best_score})")]
    NoGrid { page: u32, best_score: i32 },

    #[error("Strategy produced no values: {0}")]
    Empty(String),

    #[error("Secondary extraction failed: {0}")]
    Secondary(#[from] SecondaryError),
}

#[derive(Error, Debug)]
pub enum SecondaryError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Secondary extraction is disabled: {0}")]
    Disabled(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Reference table error: {0}")]
    Reference(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No input documents found in {0}")]
    NoDocuments(String),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
