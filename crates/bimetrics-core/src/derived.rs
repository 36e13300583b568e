//! Derived field calculator
//!
//! Ratios and differences the query API does not return. Percent-kind
//! results are already multiplied by 100, matching what `as_percent`
//! expects.
//!
//! A zero denominator never produces NaN or infinity: the plain functions
//! return 0, and [`ratio_value`] applies the report's sentinel (0 or null).

use crate::error::{CoreError, CoreResult};
use crate::types::{FieldKind, FieldSpec, RatioScale, Row, Value, ZeroDenominatorPolicy};

/// `numerator / denominator * 100`, or 0 when the denominator is 0
pub fn compute_ratio(numerator: f64, denominator: f64) -> f64 {
    finite_or_zero(compute_quotient(numerator, denominator) * 100.0)
}

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn compute_quotient(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

pub fn profit_percent(profit: f64, revenue: f64) -> f64 {
    compute_ratio(profit, revenue)
}

pub fn margin_percent(net_profit: f64, estimated: f64) -> f64 {
    compute_ratio(net_profit, estimated)
}

/// Actual minus the estimate or goal
pub fn variance(actual: f64, goal: f64) -> f64 {
    actual - goal
}

pub fn variance_percent(actual: f64, goal: f64) -> f64 {
    compute_ratio(variance(actual, goal), goal)
}

pub fn avg_per_unit(total_cost: f64, unit_count: f64) -> f64 {
    compute_quotient(total_cost, unit_count)
}

/// Ratio as a cell value, applying the zero-denominator policy
pub fn ratio_value(
    numerator: f64,
    denominator: f64,
    scale: RatioScale,
    policy: ZeroDenominatorPolicy,
) -> Value {
    if denominator == 0.0 {
        return match policy {
            ZeroDenominatorPolicy::Zero => Value::Number(0.0),
            ZeroDenominatorPolicy::NotApplicable => Value::Null,
        };
    }
    match scale {
        RatioScale::Percent => Value::Number(compute_ratio(numerator, denominator)),
        RatioScale::Plain => Value::Number(compute_quotient(numerator, denominator)),
    }
}

/// Check that ratio and difference specs name their operands
pub fn validate_specs(specs: &[FieldSpec]) -> CoreResult<()> {
    for spec in specs {
        let missing = match spec.kind {
            FieldKind::Ratio => spec.ratio_of.is_none(),
            FieldKind::Difference => spec.difference_of.is_none(),
            FieldKind::Sum | FieldKind::Passthrough => false,
        };
        if missing {
            return Err(CoreError::InvalidFieldSpec {
                field: spec.name.clone(),
                reason: format!("{} field without operands", spec.kind),
            });
        }
    }
    Ok(())
}

/// Copy `row` and compute every ratio and difference field from its values.
///
/// Derived fields are evaluated in declaration order, so a ratio may refer
/// to a difference declared before it (`variancePercent` over `variance`).
pub fn derive_row(row: &Row, specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> Row {
    let mut out = row.clone();
    for spec in specs {
        match (spec.kind, &spec.ratio_of, &spec.difference_of) {
            (FieldKind::Ratio, Some((numerator, denominator)), _) => {
                let value = ratio_value(out.number(numerator), out.number(denominator), spec.scale, policy);
                out.set(spec.name.as_str(), value);
            }
            (FieldKind::Difference, _, Some((minuend, subtrahend))) => {
                let value = out.number(minuend) - out.number(subtrahend);
                out.set(spec.name.as_str(), value);
            }
            _ => {}
        }
    }
    out
}

pub fn derive_rows(rows: &[Row], specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> Vec<Row> {
    rows.iter().map(|row| derive_row(row, specs, policy)).collect()
}

/// Name of the percentage-of-total column for `field`
pub fn share_name(field: &str) -> String {
    format!("{}_share", field)
}

/// Add `<field>_share` = value / total * 100 to every row.
///
/// A zero total resolves through `policy` like any other ratio.
pub fn share_of_total(rows: &[Row], field: &str, total: f64, policy: ZeroDenominatorPolicy) -> Vec<Row> {
    let name = share_name(field);
    rows.iter()
        .map(|row| {
            let share = ratio_value(row.number(field), total, RatioScale::Percent, policy);
            row.clone().with(name.as_str(), share)
        })
        .collect()
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimetrics_utils::as_percent_default;

    #[test]
    fn test_compute_ratio_zero_denominator() {
        assert_eq!(compute_ratio(10.0, 0.0), 0.0);
        assert_eq!(compute_ratio(0.0, 0.0), 0.0);
        assert_eq!(compute_ratio(-5.0, 0.0), 0.0);
        assert_eq!(compute_quotient(7.0, 0.0), 0.0);
    }

    #[test]
    fn test_ratio_round_trips_through_percent() {
        assert_eq!(compute_ratio(50.0, 200.0), 25.0);
        assert_eq!(as_percent_default(compute_ratio(50.0, 200.0)), "25.00%");
    }

    #[test]
    fn test_named_formulas() {
        assert_eq!(profit_percent(60.0, 300.0), 20.0);
        assert_eq!(margin_percent(25.0, 0.0), 0.0);
        assert_eq!(variance(90.0, 100.0), -10.0);
        assert_eq!(variance_percent(250.0, 200.0), 25.0);
        assert_eq!(avg_per_unit(900.0, 3.0), 300.0);
        assert_eq!(avg_per_unit(900.0, 0.0), 0.0);
    }

    #[test]
    fn test_ratio_value_policies() {
        assert_eq!(
            ratio_value(1.0, 0.0, RatioScale::Percent, ZeroDenominatorPolicy::Zero),
            Value::Number(0.0)
        );
        assert_eq!(
            ratio_value(1.0, 0.0, RatioScale::Percent, ZeroDenominatorPolicy::NotApplicable),
            Value::Null
        );
        assert_eq!(
            ratio_value(1.0, 4.0, RatioScale::Plain, ZeroDenominatorPolicy::NotApplicable),
            Value::Number(0.25)
        );
    }

    #[test]
    fn test_derive_row_in_declaration_order() {
        let specs = vec![
            FieldSpec::sum("est"),
            FieldSpec::sum("act"),
            FieldSpec::difference("variance", "act", "est"),
            FieldSpec::ratio("variancePercent", "variance", "est"),
        ];
        let row = Row::new().with("month", "Feb").with("est", 200.0).with("act", 250.0);
        let derived = derive_row(&row, &specs, ZeroDenominatorPolicy::Zero);

        assert_eq!(derived.number("variance"), 50.0);
        assert_eq!(derived.number("variancePercent"), 25.0);
        assert_eq!(derived.get("month"), Some(&Value::from("Feb")));
        // input untouched
        assert!(!row.contains("variance"));
    }

    #[test]
    fn test_derive_row_non_numeric_inputs() {
        let specs = vec![FieldSpec::ratio("profitPercent", "Profit", "Revenue")];
        let row = Row::new().with("Profit", "n/a").with("Revenue", Value::Null);
        let derived = derive_row(&row, &specs, ZeroDenominatorPolicy::NotApplicable);
        assert_eq!(derived.get("profitPercent"), Some(&Value::Null));
    }

    #[test]
    fn test_validate_specs() {
        let mut broken = FieldSpec::ratio("p", "a", "b");
        broken.ratio_of = None;
        assert!(validate_specs(&[FieldSpec::sum("a"), broken]).is_err());
        assert!(validate_specs(&[FieldSpec::difference("d", "a", "b")]).is_ok());
    }

    #[test]
    fn test_share_of_total() {
        let rows = vec![
            Row::new().with("Customer", "Acme").with("Revenue", 300.0),
            Row::new().with("Customer", "Globex").with("Revenue", 100.0),
        ];
        let shared = share_of_total(&rows, "Revenue", 400.0, ZeroDenominatorPolicy::Zero);
        assert_eq!(shared[0].number("Revenue_share"), 75.0);
        assert_eq!(shared[1].number("Revenue_share"), 25.0);

        let zero_total = share_of_total(&rows, "Revenue", 0.0, ZeroDenominatorPolicy::Zero);
        assert_eq!(zero_total[0].number("Revenue_share"), 0.0);

        let not_applicable = share_of_total(&rows, "Revenue", 0.0, ZeroDenominatorPolicy::NotApplicable);
        assert_eq!(not_applicable[0].get("Revenue_share"), Some(&Value::Null));
        assert_eq!(not_applicable[1].get("Revenue_share"), Some(&Value::Null));
    }
}
