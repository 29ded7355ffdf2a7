//! Metrics & advisory engine.
//!
//! Pure functions over an immutable table snapshot plus user parameters.
//! Every failure here is local: a metric that cannot be computed becomes
//! an `Unavailable` card and the rest of the dashboard still renders.

use serde::Serialize;

use crate::error::{ErrorKind, LoadError, MetricError};
use crate::loader::LoadedSources;
use crate::logging::{log_render_summary, log_soft_failure, Domain};
use crate::table::Table;

pub mod columns;
pub mod cycle;
pub mod delta;
pub mod progress;
pub mod series;

use columns::{ColumnMap, MetricKind};
use cycle::{resolve_advisory, Advisory, PhaseTable};
use delta::{metric_delta, MetricDelta};
use progress::{goal_progress, Goal, GoalProgress};
use series::{numeric_columns, Chart, ColumnSelection, DetailTable, TimeRange};

/// Body-composition or training-log view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Body,
    Training,
}

impl View {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "body" => Some(View::Body),
            "training" => Some(View::Training),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Body => "body",
            View::Training => "training",
        }
    }
}

/// Everything the engine needs besides the table.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    pub columns: ColumnMap,
    pub goals: Vec<Goal>,
    pub phases: PhaseTable,
    pub range: TimeRange,
    pub selection: ColumnSelection,
    pub view: View,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            columns: ColumnMap::default(),
            goals: Vec::new(),
            phases: PhaseTable::default(),
            range: TimeRange::All,
            selection: ColumnSelection::Default,
            view: View::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftFailure {
    pub metric: MetricKind,
    pub kind: ErrorKind,
    pub reason: String,
}

impl SoftFailure {
    fn new(metric: MetricKind, err: &MetricError) -> Self {
        log_soft_failure(Domain::Metrics, err.kind(), metric.as_str(), &err.to_string());
        Self {
            metric,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricCard {
    Ready(MetricDelta),
    Unavailable(SoftFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressCard {
    Ready(GoalProgress),
    Unavailable(SoftFailure),
}

pub const INSUFFICIENT_HISTORY_NOTICE: &str =
    "At least two records are needed before changes and goal progress can be shown.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyView {
    pub latest_date: Option<String>,
    pub cards: Vec<MetricCard>,
    pub progress: Vec<ProgressCard>,
    /// Informational placeholder shown instead of deltas when history is short.
    pub placeholder: Option<String>,
    pub advisory: Advisory,
    pub detail: DetailTable,
    pub chart: Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingView {
    pub latest_date: Option<String>,
    pub sessions: usize,
    pub detail: DetailTable,
    pub chart: Chart,
}

/// The outbound render payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Dashboard {
    Body(BodyView),
    Training(TrainingView),
    /// Full-page error: the selected source could not be loaded.
    SourceUnavailable { source: String, reason: String },
}

/// Deltas, progress, advisory, detail table and chart for the body sheet.
pub fn build_body_view(table: &Table, params: &EngineParams) -> BodyView {
    let resolved = params.columns.resolve(table);

    let cards: Vec<MetricCard> = resolved
        .iter()
        .filter(|(spec, _)| spec.metric != MetricKind::CycleDay)
        .map(|(spec, column)| {
            match column
                .clone()
                .and_then(|c| metric_delta(table, spec, c))
            {
                Ok(delta) => MetricCard::Ready(delta),
                Err(err) => MetricCard::Unavailable(SoftFailure::new(spec.metric, &err)),
            }
        })
        .collect();

    let progress = params
        .goals
        .iter()
        .map(|goal| {
            let result = match params.columns.spec(goal.metric) {
                Some(spec) => resolved
                    .column(goal.metric)
                    .and_then(|c| goal_progress(table, goal, spec, c)),
                None => Err(MetricError::UnknownColumn {
                    metric: goal.metric,
                }),
            };
            match result {
                Ok(p) => ProgressCard::Ready(p),
                Err(err) => ProgressCard::Unavailable(SoftFailure::new(goal.metric, &err)),
            }
        })
        .collect();

    let placeholder = if table.len() < 2 {
        Some(INSUFFICIENT_HISTORY_NOTICE.to_string())
    } else {
        None
    };

    BodyView {
        latest_date: table.latest().and_then(|r| r.date_label()),
        cards,
        progress,
        placeholder,
        advisory: resolve_advisory(table, &resolved, &params.phases),
        detail: DetailTable::build(table, params.range),
        chart: Chart::build(
            table,
            params.range,
            &params.selection,
            &resolved.chart_columns(),
        ),
    }
}

/// Detail table and chart for the training log.
pub fn build_training_view(table: &Table, params: &EngineParams) -> TrainingView {
    TrainingView {
        latest_date: table.latest().and_then(|r| r.date_label()),
        sessions: table.len(),
        detail: DetailTable::build(table, params.range),
        chart: Chart::build(table, params.range, &params.selection, &numeric_columns(table)),
    }
}

/// Pick the view's source and run the engine on it. A failed load short-
/// circuits to the error state without invoking the engine.
pub fn render(sources: &LoadedSources, params: &EngineParams) -> Dashboard {
    let dashboard = match params.view {
        View::Body => match &sources.body {
            Ok(loaded) => Dashboard::Body(build_body_view(&loaded.table, params)),
            Err(err) => unavailable("body", err),
        },
        View::Training => match &sources.training {
            Some(Ok(loaded)) => Dashboard::Training(build_training_view(&loaded.table, params)),
            Some(Err(err)) => unavailable("training", err),
            None => Dashboard::SourceUnavailable {
                source: "training".to_string(),
                reason: "no training sheet configured".to_string(),
            },
        },
    };

    let (cards, soft_failures, chart_lines) = match &dashboard {
        Dashboard::Body(v) => (
            v.cards.len(),
            v.cards
                .iter()
                .filter(|c| matches!(c, MetricCard::Unavailable(_)))
                .count(),
            v.chart.lines.len(),
        ),
        Dashboard::Training(v) => (0, 0, v.chart.lines.len()),
        Dashboard::SourceUnavailable { .. } => (0, 0, 0),
    };
    log_render_summary(params.view.as_str(), cards, soft_failures, chart_lines);
    dashboard
}

fn unavailable(source: &str, err: &LoadError) -> Dashboard {
    Dashboard::SourceUnavailable {
        source: source.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::Baseline;
    use crate::loader::Loaded;
    use crate::table::parse_table;
    use std::sync::Arc;

    const BODY: &str = "Date,Height,Age,Sex,Weight,Body Fat %,Muscle,ECW,Visceral\n\
        2024/01/10,160,30,F,55.0,30.2,21.0,0.385,6\n\
        2024/01/12,160,30,F,54.5,29.9,21.1,0.383,6\n\
        2024/01/14,160,30,F,54.0,29.5,21.3,0.381,5\n";

    fn params() -> EngineParams {
        EngineParams {
            goals: vec![Goal {
                metric: MetricKind::Weight,
                target: 50.0,
                baseline: Baseline::Fixed(60.0),
            }],
            ..EngineParams::default()
        }
    }

    fn card<'a>(view: &'a BodyView, metric: MetricKind) -> &'a MetricCard {
        view.cards
            .iter()
            .find(|c| match c {
                MetricCard::Ready(d) => d.metric == metric,
                MetricCard::Unavailable(f) => f.metric == metric,
            })
            .unwrap()
    }

    #[test]
    fn test_full_body_view() {
        let table = parse_table(BODY).unwrap().0;
        let view = build_body_view(&table, &params());
        assert_eq!(view.cards.len(), 5);
        match card(&view, MetricKind::Weight) {
            MetricCard::Ready(d) => assert_eq!(d.delta, -0.5),
            other => panic!("unexpected {:?}", other),
        }
        match card(&view, MetricKind::EcwRatio) {
            MetricCard::Ready(d) => assert_eq!(d.delta, -0.002),
            other => panic!("unexpected {:?}", other),
        }
        match &view.progress[0] {
            ProgressCard::Ready(p) => assert_eq!(p.percent, 60),
            other => panic!("unexpected {:?}", other),
        }
        assert!(view.placeholder.is_none());
        assert_eq!(view.latest_date.as_deref(), Some("2024-01-14"));
        assert_eq!(view.chart.lines.len(), 4);
        assert_eq!(view.advisory.advice.day, Some(14));
    }

    #[test]
    fn test_single_row_shows_placeholder() {
        let table = parse_table("Date,a,b,c,Weight\n2024/01/10,,,,55\n").unwrap().0;
        let view = build_body_view(&table, &params());
        assert_eq!(view.placeholder.as_deref(), Some(INSUFFICIENT_HISTORY_NOTICE));
        match card(&view, MetricKind::Weight) {
            MetricCard::Unavailable(f) => assert_eq!(f.kind, ErrorKind::InsufficientHistory),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(view.progress[0], ProgressCard::Unavailable(_)));
    }

    #[test]
    fn test_narrow_table_fails_soft_per_metric() {
        let table = parse_table("Date,a,b,c,Weight\n2024/01/10,,,,55\n2024/01/11,,,,54\n")
            .unwrap()
            .0;
        let view = build_body_view(&table, &params());
        assert!(matches!(card(&view, MetricKind::Weight), MetricCard::Ready(_)));
        match card(&view, MetricKind::BodyFat) {
            MetricCard::Unavailable(f) => assert_eq!(f.kind, ErrorKind::UnknownColumn),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(view.chart.lines.len(), 1);
    }

    #[test]
    fn test_extreme_dates_do_not_abort_the_view() {
        let mut table = parse_table("Date,a,b,c,Weight\n2024/01/10,,,,55\n").unwrap().0;
        table.rows[0].date = Some(chrono::NaiveDate::MIN);
        let view = build_body_view(
            &table,
            &EngineParams {
                range: TimeRange::Last7Days,
                ..params()
            },
        );
        assert_eq!(view.detail.rows.len(), 1);
        assert!(view.placeholder.is_some());
    }

    #[test]
    fn test_drifted_columns_chart_the_carded_metrics() {
        let table = parse_table(
            "Date,Weight,Body Fat %,Muscle,ECW,Height,Age,Sex,Visceral\n\
             2024/01/10,55.0,30.2,21.0,0.385,160,30,F,6\n\
             2024/01/12,54.5,29.9,21.1,0.383,160,30,F,6\n",
        )
        .unwrap()
        .0;
        let view = build_body_view(&table, &params());
        match card(&view, MetricKind::Weight) {
            MetricCard::Ready(d) => assert_eq!(d.current, 54.5),
            other => panic!("unexpected {:?}", other),
        }
        let names: Vec<&str> = view.chart.lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Weight", "Body Fat %", "Muscle", "ECW"]);
        assert!(view.chart.skipped.is_empty());
    }

    #[test]
    fn test_render_source_unavailable_skips_engine() {
        let sources = LoadedSources {
            body: Err(LoadError::Network("dns failure".to_string())),
            training: None,
        };
        let dash = render(&sources, &params());
        match dash {
            Dashboard::SourceUnavailable { source, reason } => {
                assert_eq!(source, "body");
                assert!(reason.contains("dns failure"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_render_training_independent_of_body() {
        let (table, report) = parse_table("Date,Squat,Bench\n2024/1/1,60,40\n2024/1/3,62.5,40\n").unwrap();
        let sources = LoadedSources {
            body: Err(LoadError::PermissionDenied { status: 403 }),
            training: Some(Ok(Loaded {
                table: Arc::new(table),
                report,
                from_cache: false,
            })),
        };
        let params = EngineParams {
            view: View::Training,
            ..params()
        };
        match render(&sources, &params) {
            Dashboard::Training(v) => {
                assert_eq!(v.sessions, 2);
                assert_eq!(v.chart.lines.len(), 2);
                assert_eq!(v.detail.rows[0][1], crate::table::Cell::Number(62.5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_view_parse() {
        assert_eq!(View::parse("Training"), Some(View::Training));
        assert_eq!(View::parse("nope"), None);
    }

    #[test]
    fn test_dashboard_serializes() {
        let table = parse_table(BODY).unwrap().0;
        let dash = Dashboard::Body(build_body_view(&table, &params()));
        let json = serde_json::to_value(&dash).unwrap();
        assert_eq!(json["state"], "body");
        assert_eq!(json["cards"][0]["status"], "ready");
        assert_eq!(json["advisory"]["source"], "calendar_heuristic");
    }
}
