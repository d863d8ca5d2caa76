//! Error types for template processing operations.
//!
//! All fatal conditions propagate a [`DocfillError`] to the caller. A failed
//! remote PDF conversion is represented by [`DocfillError::ConversionService`]
//! but is treated as non-fatal by the orchestration layer: the DOCX artifact
//! is still delivered and the failure is logged. An unmatched requisite is
//! not an error at all; the matcher simply leaves the value unset.

use thiserror::Error;

/// Errors that can occur while preparing a document from a template.
#[derive(Error, Debug)]
pub enum DocfillError {
    /// The input is not a well-formed document package (bad archive or
    /// unparsable markup). Processing is aborted for that document.
    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    /// A required package part is absent (e.g. `word/document.xml`).
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// The remote PDF conversion service failed. Attempted once, no retry.
    #[error("Conversion service error: {0}")]
    ConversionService(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error (values files, structured CLI output).
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Type alias for [`Result<T, DocfillError>`].
pub type Result<T> = std::result::Result<T, DocfillError>;
