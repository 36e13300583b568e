//! Derived metrics engine
//!
//! Totals, ratios, running totals and hierarchical rollups over rows
//! returned by the BI query API, plus the report pipeline that ties them
//! together for the dashboard tables.

pub mod cumulative;
pub mod derived;
pub mod error;
pub mod period;
pub mod reducer;
pub mod reports;
pub mod rollup;
pub mod types;

use bimetrics_config::Config;
use bimetrics_ingest::{normalize_envelope, IngestError, RowSource};
use bimetrics_utils::Formatter;
use std::sync::Arc;

pub use cumulative::{compute_cumulative, cumulative_name};
pub use derived::{
    avg_per_unit, compute_quotient, compute_ratio, derive_row, derive_rows, margin_percent,
    profit_percent, share_of_total, variance, variance_percent,
};
pub use error::{CoreError, CoreResult, DefaultErrorLogger, ErrorContext, ErrorLogger, ErrorSeverity};
pub use period::{order_by_period, PeriodKey};
pub use reducer::{combine_totals, reduce_totals, reduce_with_specs};
pub use reports::{as_currency_value, CellRenderer, ColumnInfo, DisplayNode, KpiTile, ReportTable, TreeReport};
pub use rollup::{group_hierarchy, rollup, rollup_forest, rollup_input, rollup_input_forest, RollupReport};
pub use types::*;

/// Engine reference type
pub type EngineRef = Arc<MetricsEngine>;

// ==================== Metrics Engine ====================

/// Report engine bound to one configuration. Immutable after construction.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    config: Config,
    formatter: Formatter,
}

impl MetricsEngine {
    pub fn new(config: Config) -> Self {
        let formatter = Formatter::new(
            &config.currency.symbol,
            config.currency.percent_decimals,
            config.currency.number_decimals,
        );
        Self { config, formatter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// All configured report definitions
    pub fn reports(&self) -> &[ReportDefinition] {
        &self.config.reports
    }

    pub fn definition(&self, name: &str) -> CoreResult<&ReportDefinition> {
        self.config.report(name).ok_or_else(|| CoreError::ReportNotFound {
            name: name.to_string(),
        })
    }

    /// Request context for the configured default dataset
    pub fn context(&self) -> ReportContext {
        ReportContext::new(&self.config.engine.default_dataset).dense(self.config.currency.dense)
    }

    /// Zero-denominator policy: request override, then report, then engine default
    pub fn policy(&self, definition: &ReportDefinition, ctx: &ReportContext) -> ZeroDenominatorPolicy {
        ctx.zero_denominator
            .or(definition.zero_denominator)
            .unwrap_or(self.config.engine.zero_denominator)
    }

    /// Build the flat report `name` from `rows`
    pub fn report(&self, name: &str, rows: &[Row], ctx: &ReportContext) -> CoreResult<ReportTable> {
        let definition = self.definition(name)?;
        derived::validate_specs(&definition.fields)?;

        let renderer = CellRenderer::new(&self.formatter, ctx.dense);
        let table = reports::build_table(definition, rows, ctx, self.policy(definition, ctx), &renderer);
        log::debug!(
            target: "bimetrics::engine",
            "Built report '{}' for dataset '{}' with {} rows",
            name,
            ctx.dataset,
            table.rows.len()
        );
        Ok(table)
    }

    /// Rows from an API response body.
    ///
    /// An unrecognized or unsuccessful envelope is logged as an input-shape
    /// warning and yields no rows.
    pub fn rows_from_json(&self, body: &serde_json::Value, ctx: &ReportContext) -> Vec<Row> {
        match normalize_envelope(body) {
            Ok(response) => response.rows,
            Err(e) => {
                self.degrade(CoreError::from(e), "normalize_envelope", ctx);
                Vec::new()
            }
        }
    }

    /// Rows fetched from `source`.
    ///
    /// Shape problems degrade to no rows like [`MetricsEngine::rows_from_json`];
    /// a source that cannot be read at all is an error.
    pub async fn rows_from_source(
        &self,
        source: &dyn RowSource,
        target: &str,
        ctx: &ReportContext,
    ) -> CoreResult<Vec<Row>> {
        match source.fetch(target).await {
            Ok(response) => {
                log::info!(
                    target: "bimetrics::engine",
                    "Read {} rows from {}",
                    response.rows.len(),
                    target
                );
                Ok(response.rows)
            }
            Err(e @ IngestError::IoError(_)) => {
                let error = CoreError::from(e);
                DefaultErrorLogger.log_error(&error, &self.error_context("fetch", ctx));
                Err(error)
            }
            Err(e) => {
                self.degrade(CoreError::from(e), "fetch", ctx);
                Ok(Vec::new())
            }
        }
    }

    /// Build a report straight from an API response body.
    ///
    /// Unrecognized or unsuccessful envelopes yield an empty table with
    /// `has_data == false` rather than an error.
    pub fn report_from_json(
        &self,
        name: &str,
        body: &serde_json::Value,
        ctx: &ReportContext,
    ) -> CoreResult<ReportTable> {
        let rows = self.rows_from_json(body, ctx);
        self.report(name, &rows, ctx)
    }

    /// Build the hierarchical report `name` by grouping `rows` on its hierarchy
    pub fn tree_report(&self, name: &str, rows: &[Row], ctx: &ReportContext) -> CoreResult<TreeReport> {
        let definition = self.definition(name)?;
        if definition.hierarchy.is_empty() {
            return Err(CoreError::NotHierarchical {
                name: name.to_string(),
            });
        }
        derived::validate_specs(&definition.fields)?;

        let renderer = CellRenderer::new(&self.formatter, ctx.dense);
        Ok(reports::build_tree(definition, rows, ctx, self.policy(definition, ctx), &renderer))
    }

    /// One tile per non-label field, totalled over `rows`
    pub fn kpis(&self, rows: &[Row], fields: &[FieldSpec]) -> Vec<KpiTile> {
        let totals = reduce_with_specs(rows, fields, self.config.engine.zero_denominator);
        let renderer = CellRenderer::new(&self.formatter, self.config.currency.dense);

        fields
            .iter()
            .filter(|f| f.kind != FieldKind::Passthrough)
            .map(|f| {
                let value = totals.get(&f.name).cloned().unwrap_or_default();
                KpiTile {
                    name: f.name.clone(),
                    display: renderer.cell(Some(&value), f.display_format()),
                    value,
                }
            })
            .collect()
    }
}

impl MetricsEngine {
    fn error_context(&self, operation: &str, ctx: &ReportContext) -> ErrorContext {
        ErrorContext::new(operation.to_string()).with_dataset(ctx.dataset.clone())
    }

    fn degrade(&self, error: CoreError, operation: &str, ctx: &ReportContext) {
        let context = self.error_context(operation, ctx);
        DefaultErrorLogger.log_warning(&format!("treating input as empty: {}", error), &context);
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
