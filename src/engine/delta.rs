//! Latest-versus-previous deltas for tracked metrics.

use serde::Serialize;

use crate::error::MetricError;
use crate::table::Table;

use super::columns::{ColumnSpec, MetricKind};

/// Round half away from zero to `precision` decimals.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// A current value with its change since the previous record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub metric: MetricKind,
    pub label: String,
    pub unit: String,
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub precision: u32,
}

/// `round(latest[column] - previous[column], precision)` over the last two rows.
pub fn latest_delta(table: &Table, column: usize, precision: u32) -> Result<(f64, f64, f64), MetricError> {
    let rows = table.len();
    let (Some(latest), Some(previous)) = (table.latest(), table.previous()) else {
        return Err(MetricError::InsufficientHistory { rows });
    };
    let current = latest
        .number(column)
        .ok_or(MetricError::NonNumeric { column, row: rows - 1 })?;
    let prior = previous
        .number(column)
        .ok_or(MetricError::NonNumeric { column, row: rows - 2 })?;
    Ok((current, prior, round_to(current - prior, precision)))
}

pub fn metric_delta(table: &Table, spec: &ColumnSpec, column: usize) -> Result<MetricDelta, MetricError> {
    let (current, previous, delta) = latest_delta(table, column, spec.precision)?;
    Ok(MetricDelta {
        metric: spec.metric,
        label: spec.label.clone(),
        unit: spec.unit.clone(),
        current: round_to(current, spec.precision),
        previous: round_to(previous, spec.precision),
        delta,
        precision: spec.precision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;

    fn weights(values: &[&str]) -> Table {
        let mut csv = String::from("Date,a,b,c,Weight\n");
        for (i, v) in values.iter().enumerate() {
            csv.push_str(&format!("2024/1/{},,,,{}\n", i + 1, v));
        }
        parse_table(&csv).unwrap().0
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(-0.5000000001, 1), -0.5);
        assert_eq!(round_to(0.38149, 3), 0.381);
        assert_eq!(round_to(12.0, 0), 12.0);
    }

    #[test]
    fn test_negative_delta() {
        let t = weights(&["55.0", "54.5", "54.0"]);
        assert_eq!(latest_delta(&t, 4, 1).unwrap(), (54.0, 54.5, -0.5));
    }

    #[test]
    fn test_positive_delta_rounding() {
        let t = weights(&["54.3", "54.6"]);
        let (_, _, d) = latest_delta(&t, 4, 1).unwrap();
        assert_eq!(d, 0.3);
    }

    #[test]
    fn test_insufficient_history() {
        let t = weights(&["55.0"]);
        assert_eq!(
            latest_delta(&t, 4, 1),
            Err(MetricError::InsufficientHistory { rows: 1 })
        );
    }

    #[test]
    fn test_non_numeric_cell() {
        let t = weights(&["55.0", "n/a"]);
        assert_eq!(
            latest_delta(&t, 4, 1),
            Err(MetricError::NonNumeric { column: 4, row: 1 })
        );
    }

    #[test]
    fn test_column_past_width() {
        let t = weights(&["55.0", "54.0"]);
        assert!(matches!(
            latest_delta(&t, 9, 1),
            Err(MetricError::NonNumeric { column: 9, .. })
        ));
    }

    #[test]
    fn test_metric_delta_rounds_values() {
        let t = weights(&["55.04", "54.96"]);
        let spec = ColumnSpec::new(MetricKind::Weight, "Weight", "kg", 1);
        let d = metric_delta(&t, &spec, 4).unwrap();
        assert_eq!(d.current, 55.0);
        assert_eq!(d.previous, 55.0);
        assert_eq!(d.delta, -0.1);
    }
}
