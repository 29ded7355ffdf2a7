//! Linear progress from a baseline toward a user goal.

use serde::Serialize;

use crate::error::MetricError;
use crate::table::Table;

use super::columns::{ColumnSpec, MetricKind};

/// Where the starting value of a goal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Baseline {
    Fixed(f64),
    /// Earliest record holding a numeric value in the metric's column.
    FirstRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Goal {
    pub metric: MetricKind,
    pub target: f64,
    pub baseline: Baseline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub metric: MetricKind,
    pub label: String,
    pub start: f64,
    pub current: f64,
    pub target: f64,
    /// Percent of the way from start to target, clamped to [0, 100].
    pub percent: u8,
}

/// `clamp(0, 100, round(100 * (start - current) / (start - target)))`.
/// Undefined when start equals target or any input is not finite.
pub fn progress(start: f64, current: f64, target: f64) -> Result<u8, MetricError> {
    let finite = start.is_finite() && current.is_finite() && target.is_finite();
    if !finite || start == target {
        return Err(MetricError::ProgressUndefined);
    }
    let raw = (100.0 * (start - current) / (start - target)).round();
    Ok(raw.clamp(0.0, 100.0) as u8)
}

pub fn goal_progress(
    table: &Table,
    goal: &Goal,
    spec: &ColumnSpec,
    column: usize,
) -> Result<GoalProgress, MetricError> {
    let rows = table.len();
    if rows < 2 {
        return Err(MetricError::InsufficientHistory { rows });
    }
    let current = table
        .latest()
        .and_then(|r| r.number(column))
        .ok_or(MetricError::NonNumeric { column, row: rows - 1 })?;
    let start = match goal.baseline {
        Baseline::Fixed(v) => v,
        Baseline::FirstRecord => table
            .rows
            .iter()
            .find_map(|r| r.number(column))
            .ok_or(MetricError::NonNumeric { column, row: 0 })?,
    };
    let percent = progress(start, current, goal.target)?;
    Ok(GoalProgress {
        metric: goal.metric,
        label: spec.label.clone(),
        start,
        current,
        target: goal.target,
        percent,
    })
}
