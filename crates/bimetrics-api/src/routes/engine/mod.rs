//! Engine routes - ad-hoc totals, running totals and rollups

pub mod api;

pub use api::{api_cumulative, api_rollup, api_totals, RollupRequest, RowsRequest};
