//! Chart series, column selection and the time-ranged detail table.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::table::{Cell, Row, Table, DATE_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Last7Days,
    Last30Days,
    #[default]
    All,
}

impl TimeRange {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "7d" | "7" | "week" => Some(TimeRange::Last7Days),
            "30d" | "30" | "month" => Some(TimeRange::Last30Days),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    pub fn days(&self) -> Option<i64> {
        match self {
            TimeRange::Last7Days => Some(7),
            TimeRange::Last30Days => Some(30),
            TimeRange::All => None,
        }
    }

    /// Inclusive window of calendar days ending at `as_of`, clamped at the
    /// earliest representable date.
    pub fn window(&self, as_of: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        self.days().map(|days| {
            let start = as_of
                .checked_sub_signed(Duration::days(days - 1))
                .unwrap_or(NaiveDate::MIN);
            (start, as_of)
        })
    }

    /// Rows inside the range, in table order. Ranged views are anchored on
    /// the latest dated record and skip undated rows.
    pub fn select<'a>(&self, table: &'a Table) -> Vec<&'a Row> {
        if *self == TimeRange::All {
            return table.rows.iter().collect();
        }
        let Some(window) = table.latest_date().and_then(|d| self.window(d)) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .filter(|r| matches!(r.date, Some(d) if d >= window.0 && d <= window.1))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// `(date, value)` pairs for one column. Rows without a date or a numeric
/// value are left out of the series but stay in the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub column: usize,
    pub name: String,
    pub points: Vec<SeriesPoint>,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
}

impl MetricSeries {
    pub fn from_rows(rows: &[&Row], column: usize, name: &str) -> Self {
        let points: Vec<SeriesPoint> = rows
            .iter()
            .filter_map(|r| {
                let date = r.date?;
                let value = r.number(column)?;
                Some(SeriesPoint { date, value })
            })
            .collect();
        let (y_min, y_max) = bounds(points.iter().map(|p| p.value));
        Self {
            column,
            name: name.to_string(),
            points,
            y_min,
            y_max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    values.fold((None, None), |(lo, hi), v| {
        (
            Some(lo.map_or(v, |l: f64| l.min(v))),
            Some(hi.map_or(v, |h: f64| h.max(v))),
        )
    })
}

/// Which columns to chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "columns")]
pub enum ColumnSelection {
    /// The view's default set.
    #[default]
    Default,
    /// Header names picked by the user; may be empty.
    Named(Vec<String>),
    Indices(Vec<usize>),
}

impl ColumnSelection {
    /// Comma-separated header names; an empty string selects nothing.
    pub fn parse(raw: &str) -> Self {
        ColumnSelection::Named(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Column indices to chart plus the requested entries that did not
    /// resolve against this table.
    pub fn resolve(&self, table: &Table, defaults: &[usize]) -> (Vec<usize>, Vec<String>) {
        let mut columns = Vec::new();
        let mut skipped = Vec::new();
        match self {
            ColumnSelection::Default => {
                for &idx in defaults {
                    if idx != DATE_COLUMN && idx < table.width() {
                        push_unique(&mut columns, idx);
                    } else {
                        skipped.push(format!("#{}", idx));
                    }
                }
            }
            ColumnSelection::Indices(indices) => {
                for &idx in indices {
                    if idx != DATE_COLUMN && idx < table.width() {
                        push_unique(&mut columns, idx);
                    } else {
                        skipped.push(format!("#{}", idx));
                    }
                }
            }
            ColumnSelection::Named(names) => {
                for name in names {
                    match table.column_named(name) {
                        Some(idx) if idx != DATE_COLUMN => push_unique(&mut columns, idx),
                        _ => skipped.push(name.clone()),
                    }
                }
            }
        }
        (columns, skipped)
    }
}

fn push_unique(columns: &mut Vec<usize>, idx: usize) {
    if !columns.contains(&idx) {
        columns.push(idx);
    }
}

/// Columns other than the date that hold at least one number.
pub fn numeric_columns(table: &Table) -> Vec<usize> {
    (0..table.width())
        .filter(|&c| c != DATE_COLUMN)
        .filter(|&c| table.rows.iter().any(|r| r.number(c).is_some()))
        .collect()
}

/// Chart-ready data: one line per selected column, each auto-scaled to
/// its own extent.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Chart {
    pub lines: Vec<MetricSeries>,
    pub skipped: Vec<String>,
}

impl Chart {
    pub fn build(
        table: &Table,
        range: TimeRange,
        selection: &ColumnSelection,
        defaults: &[usize],
    ) -> Self {
        let (columns, skipped) = selection.resolve(table, defaults);
        let rows = range.select(table);
        let lines = columns
            .into_iter()
            .map(|c| MetricSeries::from_rows(&rows, c, table.header(c).unwrap_or_default()))
            .collect();
        Self { lines, skipped }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(MetricSeries::is_empty)
    }
}

/// Rows in the selected range, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DetailTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DetailTable {
    pub fn build(table: &Table, range: TimeRange) -> Self {
        let rows = range
            .select(table)
            .into_iter()
            .rev()
            .map(|r| r.cells.clone())
            .collect();
        Self {
            headers: table.headers.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_table;

    fn table() -> Table {
        parse_table(
            "Date,a,b,c,Weight,Fat\n\
             2024/01/01,,,,56.0,31\n\
             2024/01/20,,,,55.0,30\n\
             bad,,,,54.8,x\n\
             2024/01/25,,,,54.5,29.5\n\
             2024/01/31,,,,54.0,29\n",
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_range_parse() {
        assert_eq!(TimeRange::parse("7d"), Some(TimeRange::Last7Days));
        assert_eq!(TimeRange::parse(" ALL "), Some(TimeRange::All));
        assert_eq!(TimeRange::parse("fortnight"), None);
    }

    #[test]
    fn test_range_anchored_on_latest_date() {
        let t = table();
        assert_eq!(TimeRange::Last7Days.select(&t).len(), 2);
        assert_eq!(TimeRange::Last30Days.select(&t).len(), 3);
        assert_eq!(TimeRange::All.select(&t).len(), 5);
    }

    #[test]
    fn test_series_drops_undated_and_non_numeric() {
        let t = table();
        let rows = TimeRange::All.select(&t);
        let weight = MetricSeries::from_rows(&rows, 4, "Weight");
        assert_eq!(weight.points.len(), 4);
        assert_eq!(weight.y_min, Some(54.0));
        assert_eq!(weight.y_max, Some(56.0));
        let fat = MetricSeries::from_rows(&rows, 5, "Fat");
        assert_eq!(fat.points.len(), 4);
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn test_empty_selection_renders_nothing() {
        let t = table();
        let chart = Chart::build(&t, TimeRange::All, &ColumnSelection::parse(""), &[4, 5]);
        assert!(chart.lines.is_empty());
        assert!(chart.skipped.is_empty());
    }

    #[test]
    fn test_default_selection_skips_out_of_width() {
        let t = table();
        let chart = Chart::build(&t, TimeRange::All, &ColumnSelection::Default, &[4, 5, 6, 7]);
        assert_eq!(chart.lines.len(), 2);
        assert_eq!(chart.skipped, vec!["#6".to_string(), "#7".to_string()]);
    }

    #[test]
    fn test_named_selection() {
        let t = table();
        let sel = ColumnSelection::parse("Fat, Missing, Date");
        let (cols, skipped) = sel.resolve(&t, &[]);
        assert_eq!(cols, vec![5]);
        assert_eq!(skipped, vec!["Missing".to_string(), "Date".to_string()]);
    }

    #[test]
    fn test_detail_table_newest_first() {
        let t = table();
        let detail = DetailTable::build(&t, TimeRange::Last7Days);
        assert_eq!(detail.rows.len(), 2);
        assert_eq!(detail.rows[0][4], Cell::Number(54.0));
        assert_eq!(detail.rows[1][4], Cell::Number(54.5));
    }

    #[test]
    fn test_numeric_columns() {
        let t = table();
        assert_eq!(numeric_columns(&t), vec![4, 5]);
    }

    #[test]
    fn test_range_near_earliest_date_is_clamped() {
        let t = Table::new(
            vec!["Date".to_string(), "W".to_string()],
            vec![Row {
                date: NaiveDate::MIN.checked_add_signed(Duration::days(2)),
                cells: vec![Cell::Text("earliest".to_string()), Cell::Number(55.0)],
            }],
        );
        let (start, _) = TimeRange::Last30Days.window(t.latest_date().unwrap()).unwrap();
        assert_eq!(start, NaiveDate::MIN);
        assert_eq!(TimeRange::Last7Days.select(&t).len(), 1);
        let detail = DetailTable::build(&t, TimeRange::Last30Days);
        assert_eq!(detail.rows.len(), 1);
    }

    #[test]
    fn test_window_at_min_date() {
        let (start, end) = TimeRange::Last7Days.window(NaiveDate::MIN).unwrap();
        assert_eq!(start, NaiveDate::MIN);
        assert_eq!(end, NaiveDate::MIN);
    }

    #[test]
    fn test_range_on_undated_table_is_empty() {
        let t = parse_table("Date,W\nfoo,1\nbar,2\n").unwrap().0;
        assert!(TimeRange::Last7Days.select(&t).is_empty());
        assert_eq!(TimeRange::All.select(&t).len(), 2);
    }
}
