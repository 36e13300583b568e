//! Error types for bimetrics-ingest

use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unrecognized response envelope: {shape}")]
    UnrecognizedEnvelope { shape: String },

    #[error("Query reported failure: {message}")]
    Unsuccessful { message: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error")]
    IoError(#[from] io::Error),
}

/// Result type with IngestError
pub type IngestResult<T> = Result<T, IngestError>;
