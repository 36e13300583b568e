//! Response envelope normalization
//!
//! The `/bi/query`, `/bi/kpis`, `/bi/drilldown` and `/bi/chart` endpoints do
//! not agree on a response shape. Accepted variants:
//!
//! - `{ "success": true, "data": { "data": [..], "pagination": {..} } }`
//! - `{ "success": true, "data": [..] }` and `{ "data": [..] }`
//! - `{ "rows": [..] }`
//! - `{ "data": { "Revenue": 1, .. } }` (a single KPI row)
//! - a bare array of row objects

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{IngestError, IngestResult};
use crate::types::Row;

/// Pagination block, tolerant of camelCase and alternative names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default, alias = "pageSize", alias = "limit", alias = "per_page")]
    pub page_size: Option<u64>,
    #[serde(default, alias = "totalCount", alias = "totalRecords", alias = "total_count")]
    pub total: Option<u64>,
    #[serde(default, alias = "totalPages")]
    pub total_pages: Option<u64>,
}

/// Rows extracted from one API response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Extract rows from any supported envelope
pub fn normalize_envelope(body: &Json) -> IngestResult<QueryResponse> {
    match body {
        Json::Array(items) => Ok(QueryResponse {
            rows: collect_rows(items),
            pagination: None,
        }),
        Json::Object(object) => {
            if object.get("success").and_then(Json::as_bool) == Some(false) {
                let message = object
                    .get("message")
                    .or_else(|| object.get("error"))
                    .and_then(Json::as_str)
                    .unwrap_or("no message")
                    .to_string();
                return Err(IngestError::Unsuccessful { message });
            }

            let top_pagination = object.get("pagination").and_then(parse_pagination);

            match object.get("data") {
                Some(Json::Array(items)) => Ok(QueryResponse {
                    rows: collect_rows(items),
                    pagination: top_pagination,
                }),
                Some(Json::Object(inner)) => {
                    let pagination = inner
                        .get("pagination")
                        .and_then(parse_pagination)
                        .or(top_pagination);
                    match inner.get("data").or_else(|| inner.get("rows")) {
                        Some(Json::Array(items)) => Ok(QueryResponse {
                            rows: collect_rows(items),
                            pagination,
                        }),
                        Some(other) => Err(unrecognized("data.data", other)),
                        None if !inner.is_empty() && inner.values().all(is_scalar) => Ok(QueryResponse {
                            rows: Row::from_json(&Json::Object(inner.clone())).into_iter().collect(),
                            pagination: None,
                        }),
                        None => Err(IngestError::UnrecognizedEnvelope {
                            shape: "data object without rows".to_string(),
                        }),
                    }
                }
                Some(other) => Err(unrecognized("data", other)),
                None => match object.get("rows") {
                    Some(Json::Array(items)) => Ok(QueryResponse {
                        rows: collect_rows(items),
                        pagination: top_pagination,
                    }),
                    _ => Err(IngestError::UnrecognizedEnvelope {
                        shape: "object without data or rows".to_string(),
                    }),
                },
            }
        }
        other => Err(unrecognized("body", other)),
    }
}

/// Rows from any supported envelope; shape errors degrade to "no data"
pub fn rows_or_empty(body: &Json) -> Vec<Row> {
    match normalize_envelope(body) {
        Ok(response) => response.rows,
        Err(e) => {
            log::warn!(target: "bimetrics::ingest", "Treating response as empty: {}", e);
            Vec::new()
        }
    }
}

/// Column order for dynamic tables, taken from the first row
pub fn discover_columns(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|row| row.keys().map(str::to_string).collect())
        .unwrap_or_default()
}

fn collect_rows(items: &[Json]) -> Vec<Row> {
    let rows: Vec<Row> = items.iter().filter_map(Row::from_json).collect();
    if rows.len() < items.len() {
        log::warn!(
            target: "bimetrics::ingest",
            "Skipped {} non-object items in response",
            items.len() - rows.len()
        );
    }
    rows
}

fn parse_pagination(value: &Json) -> Option<Pagination> {
    serde_json::from_value(value.clone()).ok()
}

fn is_scalar(value: &Json) -> bool {
    !matches!(value, Json::Array(_) | Json::Object(_))
}

fn unrecognized(location: &str, value: &Json) -> IngestError {
    let kind = match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    IngestError::UnrecognizedEnvelope {
        shape: format!("{} is a {}", location, kind),
    }
}
