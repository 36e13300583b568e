//! Report API endpoints - JSON API

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use bimetrics_core::{
    DefaultErrorLogger, ErrorContext, ErrorLogger, ReportContext, ReportTable, TreeReport,
    ZeroDenominatorPolicy,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query string accepted by the report endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub dataset: Option<String>,
    pub dense: Option<bool>,
    #[serde(default)]
    pub order: bool,
    pub zero_denominator: Option<ZeroDenominatorPolicy>,
}

impl ReportQuery {
    fn context(&self, state: &AppState) -> ReportContext {
        let mut ctx = state.engine.context();
        if let Some(dataset) = &self.dataset {
            ctx.dataset = dataset.clone();
        }
        if let Some(dense) = self.dense {
            ctx.dense = dense;
        }
        ctx.order_by_period = self.order;
        ctx.zero_denominator = self.zero_denominator;
        ctx
    }
}

/// Entry in the report listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub name: String,
    pub title: String,
    pub fields: Vec<String>,
    pub hierarchical: bool,
}

pub async fn api_reports(State(state): State<AppState>) -> Json<Vec<ReportSummary>> {
    let reports = state
        .engine
        .reports()
        .iter()
        .map(|r| ReportSummary {
            name: r.name.clone(),
            title: r.title.clone(),
            fields: r.fields.iter().map(|f| f.name.clone()).collect(),
            hierarchical: !r.hierarchy.is_empty(),
        })
        .collect();
    Json(reports)
}

/// Build a flat report from a query API response body
pub async fn api_report(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ReportQuery>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<ReportTable>> {
    let Json(body) = payload?;
    let ctx = query.context(&state);
    state
        .engine
        .report_from_json(&name, &body, &ctx)
        .map(Json)
        .map_err(|e| logged(e, "report", &ctx))
}

/// Build a hierarchical report from a query API response body
pub async fn api_report_tree(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ReportQuery>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<TreeReport>> {
    let Json(body) = payload?;
    let ctx = query.context(&state);
    let rows = state.engine.rows_from_json(&body, &ctx);
    state
        .engine
        .tree_report(&name, &rows, &ctx)
        .map(Json)
        .map_err(|e| logged(e, "tree_report", &ctx))
}

fn logged(error: bimetrics_core::CoreError, operation: &str, ctx: &ReportContext) -> ApiError {
    let context = ErrorContext::new(operation.to_string()).with_dataset(ctx.dataset.clone());
    DefaultErrorLogger.log_error(&error, &context);
    ApiError::from(error)
}
