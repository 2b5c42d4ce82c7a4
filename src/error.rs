//! Defines the custom error types for the scrape-toolkit library.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for every toolkit operation.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller supplied an invalid combination of parameters.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// A referenced column does not exist in the table schema.
    #[error("Schema Error: {0}")]
    Schema(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error raised by the delimited-file reader or writer.
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    /// Tabular data that is readable but structurally malformed.
    #[error("Parse Error: {0}")]
    Parse(String),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing the TOML configuration file.
    #[error("TOML Error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// A CSS selector failed to compile.
    #[error("Selector Error: '{selector}': {message}")]
    Selector {
        /// The selector text as supplied.
        selector: String,
        /// The parser's complaint.
        message: String,
    },

    /// No supported date layout matched the input.
    #[error("Date Parsing Error: {0}")]
    DateParse(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when the error came from reading or writing the filesystem.
    pub fn is_io(&self) -> bool {
        match self {
            AppError::Io(_) => true,
            AppError::Csv(e) => matches!(e.kind(), csv::ErrorKind::Io(_)),
            _ => false,
        }
    }
}
