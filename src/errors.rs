/*!
 * Error types for the transmark application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors raised while validating or loading a glossary file
#[derive(Error, Debug)]
pub enum GlossaryError {
    /// The glossary file does not exist or cannot be read
    #[error("Glossary file not readable: {0}")]
    Unreadable(String),

    /// The file extension is not a supported glossary format
    #[error("Unsupported glossary format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    /// A row does not carry exactly the two required columns
    #[error("Glossary row {row} has {found} columns, expected exactly 2")]
    ColumnCount {
        /// 1-based row number, header included
        row: usize,
        /// Number of columns found on that row
        found: usize,
    },

    /// A data cell is empty
    #[error("Glossary row {row} has an empty {column} cell")]
    BlankCell {
        /// 1-based row number, header included
        row: usize,
        /// Which column was blank ("term" or "translation")
        column: &'static str,
    },

    /// The file has no header or no data rows at all
    #[error("Glossary file is empty: {0}")]
    Empty(String),
}

/// Errors that can occur during translation of a segment
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The service returned text that is not valid structured output
    #[error("Structured output invalid: {0}")]
    StructuredOutput(String),

    /// The repair loop spent all its attempts without producing valid output
    #[error("Repair attempts exhausted after {attempts} tries: {last_error}")]
    RepairExhausted {
        /// Number of repair calls made
        attempts: u32,
        /// The error from the final attempt
        last_error: String,
    },

    /// The outer retry loop spent all its attempts
    #[error("Max retries ({attempts}) reached. Last error: {last_error}")]
    RetriesExhausted {
        /// Number of full attempts made
        attempts: u32,
        /// The error from the final attempt
        last_error: String,
    },

    /// The service produced an empty primary text with no recoverable content
    #[error("Empty translation for segment {sequence_number}")]
    EmptyTranslation {
        /// Segment that produced no text
        sequence_number: usize,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from glossary validation or loading
    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
