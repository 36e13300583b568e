//! Aggregate reducer: field-by-field totals over a set of rows

use crate::derived::derive_row;
use crate::types::{FieldKind, FieldSpec, Row, ZeroDenominatorPolicy};

/// Sum each named field across `rows`.
///
/// Missing and non-numeric values count as 0, and an empty slice yields a
/// row of zeros, one per field.
pub fn reduce_totals<S: AsRef<str>>(rows: &[Row], fields: &[S]) -> Row {
    let mut totals = Row::new();
    for field in fields {
        let name = field.as_ref();
        let sum = rows.iter().fold(0.0, |acc, row| acc + row.number(name));
        totals.set(name, sum);
    }
    totals
}

/// Field-wise sum of two totals rows
pub fn combine_totals<S: AsRef<str>>(left: &Row, right: &Row, fields: &[S]) -> Row {
    let mut combined = Row::new();
    for field in fields {
        let name = field.as_ref();
        combined.set(name, left.number(name) + right.number(name));
    }
    combined
}

/// Totals for the sum fields of `specs`, with ratio and difference fields
/// recomputed from those totals rather than summed
pub fn reduce_with_specs(rows: &[Row], specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> Row {
    let sums: Vec<&str> = specs
        .iter()
        .filter(|s| s.kind == FieldKind::Sum)
        .map(|s| s.name.as_str())
        .collect();
    derive_row(&reduce_totals(rows, &sums), specs, policy)
}
