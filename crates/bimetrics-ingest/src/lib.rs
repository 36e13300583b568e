//! Ingest layer for BI query API responses
//!
//! Turns the API's JSON envelopes into [`Row`]s the engine can consume.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::{discover_columns, normalize_envelope, rows_or_empty, Pagination, QueryResponse};
pub use error::{IngestError, IngestResult};
pub use types::{Row, Value};

// ==================== Row Sources ====================

/// Row source reference type
pub type RowSourceRef = Arc<dyn RowSource>;

/// Anything that can produce a normalized query response
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Fetch and normalize the response identified by `target`
    async fn fetch(&self, target: &str) -> IngestResult<QueryResponse>;
}

/// Reads saved API responses from JSON files
#[derive(Debug, Clone, Default)]
pub struct JsonFileSource {
    base_dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Parse response text that is already in memory
    pub fn parse(content: &str) -> IngestResult<QueryResponse> {
        let body: serde_json::Value = serde_json::from_str(content)?;
        normalize_envelope(&body)
    }
}

#[async_trait]
impl RowSource for JsonFileSource {
    async fn fetch(&self, target: &str) -> IngestResult<QueryResponse> {
        let path = self.base_dir.join(target);
        log::debug!(target: "bimetrics::ingest", "Reading rows from {}", path.display());
        let content = tokio::fs::read_to_string(&path).await?;
        Self::parse(&content)
    }
}
