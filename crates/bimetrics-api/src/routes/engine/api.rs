//! Engine API endpoints - JSON API

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use bimetrics_core::derived::validate_specs;
use bimetrics_core::{
    compute_cumulative, reduce_totals, rollup_input_forest, DefaultErrorLogger, ErrorContext,
    ErrorLogger, FieldSpec, RollupReport, Row, TreeNodeInput, TreeInput, ZeroDenominatorPolicy,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Rows plus the fields to operate on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsRequest {
    #[serde(default)]
    pub rows: Vec<Row>,
    pub fields: Vec<String>,
}

/// Id-addressed tree with the report fields to roll up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupRequest {
    pub nodes: Vec<TreeNodeInput>,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub zero_denominator: Option<ZeroDenominatorPolicy>,
}

pub async fn api_totals(payload: Result<Json<RowsRequest>, JsonRejection>) -> ApiResult<Json<Row>> {
    let Json(request) = payload?;
    Ok(Json(reduce_totals(&request.rows, &request.fields)))
}

/// Rows are sequenced in the order received
pub async fn api_cumulative(
    payload: Result<Json<RowsRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<Row>>> {
    let Json(request) = payload?;
    Ok(Json(compute_cumulative(&request.rows, &request.fields)))
}

/// Trees deeper than `engine.max_tree_depth` are rejected as structural errors
pub async fn api_rollup(
    State(state): State<AppState>,
    payload: Result<Json<RollupRequest>, JsonRejection>,
) -> ApiResult<Json<RollupReport>> {
    let Json(request) = payload?;
    let engine = &state.engine.config().engine;
    let policy = request.zero_denominator.unwrap_or(engine.zero_denominator);
    let input = TreeInput::new(request.nodes).with_max_depth(engine.max_tree_depth);

    validate_specs(&request.fields)
        .and_then(|_| rollup_input_forest(&input, &request.fields, policy))
        .map(Json)
        .map_err(|e| {
            DefaultErrorLogger.log_error(&e, &ErrorContext::new("rollup".to_string()));
            ApiError::from(e)
        })
}
