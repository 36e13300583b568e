//! Report tables: derived rows, totals and display strings for the view layer

use serde::{Deserialize, Serialize};

use bimetrics_utils::{as_currency, Formatter};

use crate::cumulative::{compute_cumulative, cumulative_name};
use crate::derived::{derive_rows, ratio_value, share_name, share_of_total};
use crate::period::order_by_period;
use crate::reducer::reduce_with_specs;
use crate::rollup::{group_hierarchy, rollup_forest};
use crate::types::{
    DisplayFormat, FieldKind, RatioScale, ReportContext, ReportDefinition, Row, TreeRow, Value,
    ZeroDenominatorPolicy,
};

/// Label placed in the first text column of a totals row
pub const TOTAL_LABEL: &str = "Total";

/// Column header metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: FieldKind,
    pub display: DisplayFormat,
}

/// A flat report with its totals row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTable {
    pub report: String,
    pub title: String,
    pub dataset: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Row>,
    pub totals: Row,
    /// Cells rendered per column, one inner vec per row
    pub display_rows: Vec<Vec<String>>,
    pub display_totals: Vec<String>,
    pub has_data: bool,
}

/// Rendered tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayNode {
    pub cells: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DisplayNode>,
}

/// A hierarchical report rolled up from leaf rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeReport {
    pub report: String,
    pub title: String,
    pub dataset: String,
    pub columns: Vec<ColumnInfo>,
    pub roots: Vec<TreeRow>,
    pub total: Row,
    pub display_roots: Vec<DisplayNode>,
    pub display_total: Vec<String>,
    pub has_data: bool,
}

/// Single scalar summary metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiTile {
    pub name: String,
    pub value: Value,
    pub display: String,
}

/// Renders cells for one request
pub struct CellRenderer<'a> {
    formatter: &'a Formatter,
    dense: bool,
}

impl<'a> CellRenderer<'a> {
    pub fn new(formatter: &'a Formatter, dense: bool) -> Self {
        Self { formatter, dense }
    }

    /// Display string for one cell. Missing percents read "N/A"; other
    /// missing numbers are blank. Text that does not parse is shown as-is.
    pub fn cell(&self, value: Option<&Value>, display: DisplayFormat) -> String {
        if display == DisplayFormat::Text {
            return value.map(Value::label).unwrap_or_default();
        }

        let value = match value {
            Some(v) if !v.is_null() => v,
            _ if display == DisplayFormat::Percent => return "N/A".to_string(),
            _ => return String::new(),
        };

        match value.as_number() {
            Some(n) => match display {
                DisplayFormat::Currency => self.formatter.currency(n, self.dense),
                DisplayFormat::Percent => self.formatter.percent(n),
                _ => self.formatter.number(n),
            },
            None => value.label(),
        }
    }

    pub fn row(&self, row: &Row, columns: &[ColumnInfo]) -> Vec<String> {
        columns.iter().map(|c| self.cell(row.get(&c.name), c.display)).collect()
    }

    pub fn tree(&self, node: &TreeRow, columns: &[ColumnInfo]) -> DisplayNode {
        DisplayNode {
            cells: self.row(&node.row, columns),
            children: node.children.iter().map(|c| self.tree(c, columns)).collect(),
        }
    }
}

/// [`as_currency`] for a raw row value; non-numeric values format as zero
pub fn as_currency_value(value: &Value, dense: bool) -> String {
    as_currency(value.number_or_zero(), dense)
}

/// Declared columns, then generated running-total and share columns.
/// Fields found in the data but not declared are appended as text.
pub fn build_columns(definition: &ReportDefinition, rows: &[Row]) -> Vec<ColumnInfo> {
    let mut columns = declared_columns(definition);

    for field in &definition.cumulative {
        let display = definition
            .field(field)
            .map(|f| f.display_format())
            .unwrap_or(DisplayFormat::Number);
        columns.push(ColumnInfo {
            name: cumulative_name(field),
            kind: FieldKind::Sum,
            display,
        });
    }
    for field in &definition.share_of_total {
        columns.push(ColumnInfo {
            name: share_name(field),
            kind: FieldKind::Ratio,
            display: DisplayFormat::Percent,
        });
    }

    if let Some(first) = rows.first() {
        let extras: Vec<String> = first
            .keys()
            .filter(|k| !columns.iter().any(|c| c.name == *k))
            .map(str::to_string)
            .collect();
        for name in extras {
            columns.push(ColumnInfo {
                name,
                kind: FieldKind::Passthrough,
                display: DisplayFormat::Text,
            });
        }
    }

    columns
}

fn declared_columns(definition: &ReportDefinition) -> Vec<ColumnInfo> {
    definition
        .fields
        .iter()
        .map(|f| ColumnInfo {
            name: f.name.clone(),
            kind: f.kind,
            display: f.display_format(),
        })
        .collect()
}

/// Run the flat report pipeline: order, derive, total, share, accumulate, render
pub fn build_table(
    definition: &ReportDefinition,
    rows: &[Row],
    ctx: &ReportContext,
    policy: ZeroDenominatorPolicy,
    renderer: &CellRenderer<'_>,
) -> ReportTable {
    let ordered = match (&definition.period_field, ctx.order_by_period) {
        (Some(field), true) => order_by_period(rows, field),
        _ => rows.to_vec(),
    };

    let mut derived = derive_rows(&ordered, &definition.fields, policy);
    let mut totals = reduce_with_specs(&derived, &definition.fields, policy);
    log::debug!(
        target: "bimetrics::report",
        "Report '{}': derived {} rows",
        definition.name,
        derived.len()
    );

    for field in &definition.share_of_total {
        let total = totals.number(field);
        derived = share_of_total(&derived, field, total, policy);
        totals.set(share_name(field), ratio_value(total, total, RatioScale::Percent, policy));
    }

    if !definition.cumulative.is_empty() {
        derived = compute_cumulative(&derived, &definition.cumulative);
        for field in &definition.cumulative {
            let total = totals.number(field);
            totals.set(cumulative_name(field), total);
        }
    }

    label_totals(definition, &mut totals);

    let columns = build_columns(definition, &derived);
    let display_rows = derived.iter().map(|r| renderer.row(r, &columns)).collect();
    let display_totals = renderer.row(&totals, &columns);

    ReportTable {
        report: definition.name.clone(),
        title: definition.title.clone(),
        dataset: ctx.dataset.clone(),
        columns,
        has_data: !derived.is_empty(),
        rows: derived,
        totals,
        display_rows,
        display_totals,
    }
}

/// Group leaf rows by the report's hierarchy and roll them up
pub fn build_tree(
    definition: &ReportDefinition,
    rows: &[Row],
    ctx: &ReportContext,
    policy: ZeroDenominatorPolicy,
    renderer: &CellRenderer<'_>,
) -> TreeReport {
    let forest = group_hierarchy(rows, &definition.hierarchy);
    let mut rolled = rollup_forest(forest, &definition.fields, policy);
    label_totals(definition, &mut rolled.total);
    log::debug!(
        target: "bimetrics::report",
        "Report '{}': rolled {} leaf rows into {} roots",
        definition.name,
        rows.len(),
        rolled.roots.len()
    );

    let columns = declared_columns(definition);
    let display_roots = rolled.roots.iter().map(|r| renderer.tree(r, &columns)).collect();
    let display_total = renderer.row(&rolled.total, &columns);

    TreeReport {
        report: definition.name.clone(),
        title: definition.title.clone(),
        dataset: ctx.dataset.clone(),
        columns,
        has_data: !rows.is_empty(),
        roots: rolled.roots,
        total: rolled.total,
        display_roots,
        display_total,
    }
}

fn label_totals(definition: &ReportDefinition, totals: &mut Row) {
    if let Some(first) = definition.fields.iter().find(|f| f.kind == FieldKind::Passthrough) {
        totals.set(first.name.as_str(), TOTAL_LABEL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSpec;

    fn salesperson() -> ReportDefinition {
        ReportDefinition {
            name: "salesperson".to_string(),
            title: "By Salesperson".to_string(),
            fields: vec![
                FieldSpec::passthrough("Salesperson"),
                FieldSpec::sum("JobRevenue").display_as(DisplayFormat::Currency),
                FieldSpec::sum("Profit").display_as(DisplayFormat::Currency),
                FieldSpec::ratio("profitPercent", "Profit", "JobRevenue"),
            ],
            period_field: None,
            cumulative: vec![],
            share_of_total: vec!["JobRevenue".to_string()],
            hierarchy: vec![],
            zero_denominator: None,
        }
    }

    #[test]
    fn test_cell_rendering() {
        let formatter = Formatter::default();
        let plain = CellRenderer::new(&formatter, false);
        let dense = CellRenderer::new(&formatter, true);

        assert_eq!(plain.cell(Some(&Value::Number(1234.5)), DisplayFormat::Currency), "$1,234.50");
        assert_eq!(dense.cell(Some(&Value::Number(1234.5)), DisplayFormat::Currency), "$1.2k");
        assert_eq!(plain.cell(Some(&Value::Number(25.0)), DisplayFormat::Percent), "25.00%");
        assert_eq!(plain.cell(Some(&Value::Null), DisplayFormat::Percent), "N/A");
        assert_eq!(plain.cell(None, DisplayFormat::Currency), "");
        assert_eq!(plain.cell(Some(&Value::Number(12345.0)), DisplayFormat::Number), "12,345");
        assert_eq!(plain.cell(Some(&Value::Number(0.0)), DisplayFormat::Number), "0");
        assert_eq!(plain.cell(Some(&Value::from("abc")), DisplayFormat::Number), "abc");
        assert_eq!(plain.cell(Some(&Value::Number(7.0)), DisplayFormat::Text), "7");
    }

    #[test]
    fn test_currency_from_row_values() {
        assert_eq!(as_currency_value(&Value::Number(2_500_000.0), true), "$2.5m");
        assert_eq!(as_currency_value(&Value::from("1234.5"), false), "$1,234.50");
        assert_eq!(as_currency_value(&Value::from("n/a"), false), "$0.00");
        assert_eq!(as_currency_value(&Value::Null, true), "$0");
    }

    #[test]
    fn test_build_columns_order() {
        let rows = vec![Row::new()
            .with("Salesperson", "Ann")
            .with("Region", "West")
            .with("JobRevenue", 10.0)];
        let columns = build_columns(&salesperson(), &rows);
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Salesperson", "JobRevenue", "Profit", "profitPercent", "JobRevenue_share", "Region"]
        );
        assert_eq!(columns[4].display, DisplayFormat::Percent);
        assert_eq!(columns[5].display, DisplayFormat::Text);
    }

    #[test]
    fn test_table_with_shares() {
        let rows = vec![
            Row::new().with("Salesperson", "Ann").with("JobRevenue", 300.0).with("Profit", 30.0),
            Row::new().with("Salesperson", "Bob").with("JobRevenue", 100.0).with("Profit", 30.0),
        ];
        let formatter = Formatter::default();
        let renderer = CellRenderer::new(&formatter, false);
        let table = build_table(
            &salesperson(),
            &rows,
            &ReportContext::new("jobs"),
            ZeroDenominatorPolicy::Zero,
            &renderer,
        );

        assert!(table.has_data);
        assert_eq!(table.rows[0].number("JobRevenue_share"), 75.0);
        assert_eq!(table.rows[1].number("profitPercent"), 30.0);
        assert_eq!(table.totals.number("JobRevenue"), 400.0);
        assert_eq!(table.totals.number("profitPercent"), 15.0);
        assert_eq!(table.totals.number("JobRevenue_share"), 100.0);
        assert_eq!(table.totals.get("Salesperson"), Some(&Value::from(TOTAL_LABEL)));
        assert_eq!(table.display_rows[0], vec!["Ann", "$300.00", "$30.00", "10.00%", "75.00%"]);
        assert_eq!(table.display_totals[0], "Total");
    }

    #[test]
    fn test_empty_table() {
        let formatter = Formatter::default();
        let renderer = CellRenderer::new(&formatter, false);
        let table = build_table(
            &salesperson(),
            &[],
            &ReportContext::new("jobs"),
            ZeroDenominatorPolicy::Zero,
            &renderer,
        );
        assert!(!table.has_data);
        assert!(table.rows.is_empty());
        assert_eq!(table.totals.number("JobRevenue"), 0.0);
        assert_eq!(table.totals.number("profitPercent"), 0.0);
        assert_eq!(table.totals.number("JobRevenue_share"), 0.0);
    }

    #[test]
    fn test_zero_total_share_follows_policy() {
        let rows = vec![Row::new().with("Salesperson", "Ann").with("JobRevenue", 0.0)];
        let formatter = Formatter::default();
        let renderer = CellRenderer::new(&formatter, false);
        let table = build_table(
            &salesperson(),
            &rows,
            &ReportContext::new("jobs"),
            ZeroDenominatorPolicy::NotApplicable,
            &renderer,
        );
        assert_eq!(table.rows[0].get("JobRevenue_share"), Some(&Value::Null));
        assert_eq!(table.totals.get("JobRevenue_share"), Some(&Value::Null));
        assert_eq!(table.display_rows[0][4], "N/A");
    }

    #[test]
    fn test_tree_display() {
        let mut definition = salesperson();
        definition.share_of_total.clear();
        definition.hierarchy = vec!["Salesperson".to_string()];
        let rows = vec![
            Row::new().with("Salesperson", "Ann").with("JobRevenue", 100.0).with("Profit", 10.0),
            Row::new().with("Salesperson", "Ann").with("JobRevenue", 200.0).with("Profit", 50.0),
        ];
        let formatter = Formatter::default();
        let renderer = CellRenderer::new(&formatter, true);
        let tree = build_tree(
            &definition,
            &rows,
            &ReportContext::new("jobs"),
            ZeroDenominatorPolicy::Zero,
            &renderer,
        );

        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.display_roots[0].cells, vec!["Ann", "$300", "$60", "20.00%"]);
        assert_eq!(tree.display_roots[0].children.len(), 2);
        assert_eq!(tree.display_total, vec!["Total", "$300", "$60", "20.00%"]);
    }
}
