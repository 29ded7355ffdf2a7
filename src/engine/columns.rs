//! Resolution of tracked metrics to table columns.
//!
//! The sheet has no guaranteed schema. Each metric carries a positional
//! convention and optional header hints; resolution happens once per
//! table and every computation reads through the resulting map.

use serde::Serialize;

use crate::error::MetricError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::table::Table;
use serde_json::json;

/// Body metrics charted when the user has not picked columns.
pub const CHART_METRICS: [MetricKind; 4] = [
    MetricKind::Weight,
    MetricKind::BodyFat,
    MetricKind::MuscleMass,
    MetricKind::EcwRatio,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Weight,
    BodyFat,
    MuscleMass,
    EcwRatio,
    VisceralFat,
    CycleDay,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Weight => "weight",
            MetricKind::BodyFat => "body_fat",
            MetricKind::MuscleMass => "muscle_mass",
            MetricKind::EcwRatio => "ecw_ratio",
            MetricKind::VisceralFat => "visceral_fat",
            MetricKind::CycleDay => "cycle_day",
        }
    }
}

/// How one metric is located in a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub metric: MetricKind,
    pub label: String,
    pub unit: String,
    /// Decimal places for display and deltas.
    pub precision: u32,
    /// Conventional position, if any.
    pub index: Option<usize>,
    /// Case-insensitive header substrings, tried in order.
    pub name_hints: Vec<String>,
}

impl ColumnSpec {
    pub fn new(metric: MetricKind, label: &str, unit: &str, precision: u32) -> Self {
        Self {
            metric,
            label: label.to_string(),
            unit: unit.to_string(),
            precision,
            index: None,
            name_hints: Vec::new(),
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn hints(mut self, hints: &[&str]) -> Self {
        self.name_hints = hints.iter().map(|h| h.to_string()).collect();
        self
    }

    /// Header match wins; otherwise the position if it fits the table.
    pub fn resolve(&self, table: &Table) -> Result<usize, MetricError> {
        let by_name = self
            .name_hints
            .iter()
            .find_map(|hint| table.column_containing(hint));
        let by_index = self.index.filter(|i| *i < table.width());

        match (by_name, by_index) {
            (Some(named), Some(positional)) if named != positional => {
                log(
                    Level::Warn,
                    Domain::Metrics,
                    "column_drift",
                    obj(&[
                        ("metric", v_str(self.metric.as_str())),
                        ("by_name", json!(named)),
                        ("by_index", json!(positional)),
                    ]),
                );
                Ok(named)
            }
            (Some(named), _) => Ok(named),
            (None, Some(positional)) => Ok(positional),
            (None, None) => Err(MetricError::UnknownColumn {
                metric: self.metric,
            }),
        }
    }
}

/// The set of tracked metrics and where to look for them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMap {
    pub specs: Vec<ColumnSpec>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            specs: vec![
                ColumnSpec::new(MetricKind::Weight, "Weight", "kg", 1)
                    .at(4)
                    .hints(&["weight", "體重"]),
                ColumnSpec::new(MetricKind::BodyFat, "Body fat", "%", 1)
                    .at(5)
                    .hints(&["body fat", "體脂"]),
                ColumnSpec::new(MetricKind::MuscleMass, "Muscle mass", "kg", 1)
                    .at(6)
                    .hints(&["muscle", "肌肉"]),
                ColumnSpec::new(MetricKind::EcwRatio, "ECW ratio", "", 3)
                    .at(7)
                    .hints(&["ecw"]),
                ColumnSpec::new(MetricKind::VisceralFat, "Visceral fat", "", 1)
                    .at(8)
                    .hints(&["visceral", "內臟"]),
                ColumnSpec::new(MetricKind::CycleDay, "Cycle day", "", 0).hints(&["cycle"]),
            ],
        }
    }
}

impl ColumnMap {
    pub fn spec(&self, metric: MetricKind) -> Option<&ColumnSpec> {
        self.specs.iter().find(|s| s.metric == metric)
    }

    pub fn resolve(&self, table: &Table) -> ResolvedColumns {
        ResolvedColumns {
            entries: self
                .specs
                .iter()
                .map(|spec| (spec.clone(), spec.resolve(table)))
                .collect(),
        }
    }
}

/// Per-table resolution; each metric succeeds or fails on its own.
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    entries: Vec<(ColumnSpec, Result<usize, MetricError>)>,
}

impl ResolvedColumns {
    pub fn column(&self, metric: MetricKind) -> Result<usize, MetricError> {
        self.entries
            .iter()
            .find(|(spec, _)| spec.metric == metric)
            .map(|(_, r)| r.clone())
            .unwrap_or(Err(MetricError::UnknownColumn { metric }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ColumnSpec, Result<usize, MetricError>)> {
        self.entries.iter()
    }

    /// Resolved positions of the default chart metrics; unresolved ones are dropped.
    pub fn chart_columns(&self) -> Vec<usize> {
        CHART_METRICS
            .iter()
            .filter_map(|m| self.column(*m).ok())
            .collect()
    }
}
