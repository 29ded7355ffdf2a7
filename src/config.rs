use crate::engine::columns::{ColumnMap, MetricKind};
use crate::engine::cycle::PhaseTable;
use crate::engine::progress::{Baseline, Goal};
use crate::engine::series::{ColumnSelection, TimeRange};
use crate::engine::{EngineParams, View};
use crate::loader::{SourceSet, DEFAULT_TTL_SECS};
use crate::source::{SheetLocator, DEFAULT_SHEETS_BASE};

/// Spreadsheet the dashboard was first built against.
pub const DEFAULT_BODY_SHEET_ID: &str = "1o-_Xr7wlisU7Wo0eLY_m2sWocptJC9poMxrUSkOMCNo";
pub const DEFAULT_BODY_SHEET_TAB: &str = "allDatas";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sheets_base: String,
    pub body_sheet_id: String,
    pub body_sheet_tab: Option<String>,
    pub training_sheet_id: Option<String>,
    pub training_sheet_tab: Option<String>,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub goal_weight: f64,
    pub goal_body_fat: f64,
    pub goal_ecw: f64,
    /// Fixed weight baseline; `None` (`START_WEIGHT=first`) reads the
    /// earliest record instead.
    pub start_weight: Option<f64>,
    pub start_body_fat: Option<f64>,
    pub start_ecw: Option<f64>,
    pub phases: PhaseTable,
    pub chart_columns: ColumnSelection,
    pub time_range: TimeRange,
    pub view: View,
    /// Re-render interval for the binary; `None` renders once.
    pub refresh_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let num = |key: &str| get(key).and_then(|v| v.trim().parse::<f64>().ok());
        let secs = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());
        // `first` selects the earliest record; anything unparseable keeps the default.
        let start = |key: &str, default: Option<f64>| match get(key) {
            Some(v) if v.trim().eq_ignore_ascii_case("first") => None,
            Some(v) => v.trim().parse::<f64>().ok().or(default),
            None => default,
        };
        let text = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            sheets_base: text("SHEETS_BASE").unwrap_or_else(|| DEFAULT_SHEETS_BASE.to_string()),
            body_sheet_id: text("BODY_SHEET_ID").unwrap_or_else(|| DEFAULT_BODY_SHEET_ID.to_string()),
            // An explicitly empty tab exports the first sheet.
            body_sheet_tab: match get("BODY_SHEET_TAB") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
                None => Some(DEFAULT_BODY_SHEET_TAB.to_string()),
            },
            training_sheet_id: text("TRAINING_SHEET_ID"),
            training_sheet_tab: text("TRAINING_SHEET_TAB"),
            cache_ttl_secs: secs("CACHE_TTL_SECS").unwrap_or(DEFAULT_TTL_SECS),
            http_timeout_secs: secs("HTTP_TIMEOUT_SECS").unwrap_or(10),
            goal_weight: num("GOAL_WEIGHT").unwrap_or(50.0),
            goal_body_fat: num("GOAL_BODY_FAT").unwrap_or(22.0),
            goal_ecw: num("GOAL_ECW").unwrap_or(0.380),
            start_weight: start("START_WEIGHT", Some(60.0)),
            start_body_fat: start("START_BODY_FAT", None),
            start_ecw: start("START_ECW", None),
            phases: get("CYCLE_PHASE_ENDS")
                .and_then(|v| PhaseTable::parse(&v).ok())
                .unwrap_or_default(),
            chart_columns: get("CHART_COLUMNS")
                .map(|v| ColumnSelection::parse(&v))
                .unwrap_or_default(),
            time_range: get("TIME_RANGE")
                .and_then(|v| TimeRange::parse(&v))
                .unwrap_or_default(),
            view: get("VIEW").and_then(|v| View::parse(&v)).unwrap_or_default(),
            refresh_secs: secs("REFRESH_SECS").filter(|s| *s > 0),
        }
    }

    pub fn sources(&self) -> SourceSet {
        SourceSet {
            body: SheetLocator::new(
                "body",
                &self.sheets_base,
                &self.body_sheet_id,
                self.body_sheet_tab.as_deref(),
            ),
            training: self.training_sheet_id.as_ref().map(|id| {
                SheetLocator::new(
                    "training",
                    &self.sheets_base,
                    id,
                    self.training_sheet_tab.as_deref(),
                )
            }),
        }
    }

    pub fn goals(&self) -> Vec<Goal> {
        let baseline = |fixed: Option<f64>| fixed.map(Baseline::Fixed).unwrap_or(Baseline::FirstRecord);
        vec![
            Goal {
                metric: MetricKind::Weight,
                target: self.goal_weight,
                baseline: baseline(self.start_weight),
            },
            Goal {
                metric: MetricKind::BodyFat,
                target: self.goal_body_fat,
                baseline: baseline(self.start_body_fat),
            },
            Goal {
                metric: MetricKind::EcwRatio,
                target: self.goal_ecw,
                baseline: baseline(self.start_ecw),
            },
        ]
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            columns: ColumnMap::default(),
            goals: self.goals(),
            phases: self.phases,
            range: self.time_range,
            selection: self.chart_columns.clone(),
            view: self.view,
        }
    }
}
