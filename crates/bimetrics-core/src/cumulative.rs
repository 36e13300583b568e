//! Cumulative sequencer: running totals over period rows
//!
//! Rows are consumed in the order given. The sequencer does not sort or
//! check that the order is chronological; see [`crate::period`] for
//! ordering rows by an explicit period key.

use crate::types::Row;

/// Name of the running-total column for `field`
pub fn cumulative_name(field: &str) -> String {
    format!("cumulative_{}", field)
}

/// Add `cumulative_<field>` to every row in a single left-to-right pass
pub fn compute_cumulative<S: AsRef<str>>(rows: &[Row], fields: &[S]) -> Vec<Row> {
    let names: Vec<String> = fields.iter().map(|f| cumulative_name(f.as_ref())).collect();
    let mut running = vec![0.0; fields.len()];

    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            for (i, field) in fields.iter().enumerate() {
                running[i] += row.number(field.as_ref());
                out.set(names[i].as_str(), running[i]);
            }
            out
        })
        .collect()
}
