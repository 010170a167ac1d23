// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden

    #[error("SEC Rate limit likely exceeded")]
    RateLimited,

    #[error("Could not find CIK for ticker {0}")]
    CikNotFound(String),

    #[error("Could not find specified filing: {0}")]
    FilingDocNotFound(String),

    #[error("Failed to parse EDGAR response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read filing {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Filing has no readable content: {0}")]
    EmptyContent(String),

    #[error("Classifier request failed: {0}")]
    Classifier(#[from] reqwest::Error),

    #[error("Classifier returned HTTP {0}")]
    ClassifierStatus(reqwest::StatusCode),

    #[error("Classifier response could not be parsed: {0}")]
    ClassifierResponse(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{file} is missing required column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regression needs at least {needed} observations, got {got}")]
    TooFewObservations { needed: usize, got: usize },

    #[error("num_mention is constant across all {0} observations")]
    ConstantRegressor(usize),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("EDGAR interaction failed: {0}")]
    Edgar(#[from] EdgarError), // Automatically convert Edgar errors

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
