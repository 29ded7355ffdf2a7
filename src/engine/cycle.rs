//! Cycle-phase advisory: a calendar lookup table over a 28-day cycle.

use chrono::Datelike;
use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::logging::{log_soft_failure, Domain};
use crate::table::Table;

use super::columns::{MetricKind, ResolvedColumns};

pub const CYCLE_LENGTH: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
    Unknown,
}

impl CyclePhase {
    pub fn label(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "Menstrual",
            CyclePhase::Follicular => "Follicular",
            CyclePhase::Ovulatory => "Ovulatory",
            CyclePhase::Luteal => "Luteal",
            CyclePhase::Unknown => "Unknown",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => {
                "Energy is low: keep sessions light, prioritise mobility, iron-rich food and sleep."
            }
            CyclePhase::Follicular => {
                "Rising energy and insulin sensitivity: best window for heavy strength work and PR attempts."
            }
            CyclePhase::Ovulatory => {
                "Peak strength but looser ligaments: train hard, warm up thoroughly and watch joint form."
            }
            CyclePhase::Luteal => {
                "Water retention and cravings rise: moderate intensity, steady cardio, expect the scale to drift up."
            }
            CyclePhase::Unknown => {
                "Cycle day unavailable: record a cycle day to get phase-specific training advice."
            }
        }
    }
}

/// A phase with its recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advice {
    pub phase: CyclePhase,
    pub label: String,
    pub text: String,
    /// Normalised day in 1..=28, absent for the unknown sentinel.
    pub day: Option<u32>,
}

impl Advice {
    fn new(phase: CyclePhase, day: Option<u32>) -> Self {
        Self {
            phase,
            label: phase.label().to_string(),
            text: phase.advice().to_string(),
            day,
        }
    }

    pub fn unknown() -> Self {
        Self::new(CyclePhase::Unknown, None)
    }

    pub fn is_unknown(&self) -> bool {
        self.phase == CyclePhase::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid phase boundaries: {0}")]
pub struct InvalidPhaseTable(pub String);

/// Partition of days 1..=28 into four consecutive non-empty phases.
///
/// `ends` holds the last day of the menstrual, follicular and ovulatory
/// phases; the luteal phase runs to day 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTable {
    ends: [u32; 3],
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self { ends: [5, 13, 15] }
    }
}

impl PhaseTable {
    pub fn new(ends: [u32; 3]) -> Result<Self, InvalidPhaseTable> {
        let [m, f, o] = ends;
        if m < 1 || m >= f || f >= o || o >= CYCLE_LENGTH {
            return Err(InvalidPhaseTable(format!(
                "need 1 <= {} < {} < {} < {}",
                m, f, o, CYCLE_LENGTH
            )));
        }
        Ok(Self { ends })
    }

    /// Parse `"5,13,15"`.
    pub fn parse(raw: &str) -> Result<Self, InvalidPhaseTable> {
        let parts: Vec<u32> = raw
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| InvalidPhaseTable(e.to_string()))?;
        match parts.as_slice() {
            [m, f, o] => Self::new([*m, *f, *o]),
            _ => Err(InvalidPhaseTable(format!("expected 3 values, got {}", parts.len()))),
        }
    }

    pub fn ends(&self) -> [u32; 3] {
        self.ends
    }

    /// Phase for a day already normalised into 1..=28.
    pub fn phase_of(&self, day: u32) -> CyclePhase {
        let [m, f, o] = self.ends;
        match day {
            d if d <= m => CyclePhase::Menstrual,
            d if d <= f => CyclePhase::Follicular,
            d if d <= o => CyclePhase::Ovulatory,
            _ => CyclePhase::Luteal,
        }
    }

    /// Advice for any integer day, taken modulo the cycle length.
    pub fn advise(&self, day_in_cycle: i64) -> Advice {
        let day = normalize_day(day_in_cycle);
        Advice::new(self.phase_of(day), Some(day))
    }

    /// Advice from a raw cycle-day cell such as `"D16"`; unparseable input
    /// yields the unknown sentinel.
    pub fn advise_from_raw(&self, raw: &str) -> Advice {
        match parse_cycle_day(raw) {
            Some(day) => self.advise(day),
            None => Advice::unknown(),
        }
    }
}

/// Map any integer onto 1..=28.
pub fn normalize_day(day: i64) -> u32 {
    ((day - 1).rem_euclid(CYCLE_LENGTH as i64) + 1) as u32
}

/// First run of ASCII digits in the cell, ignoring any prefix or suffix.
pub fn parse_cycle_day(raw: &str) -> Option<i64> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// How the advisory's day was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaySource {
    CycleColumn,
    CalendarHeuristic,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    #[serde(flatten)]
    pub advice: Advice,
    pub source: DaySource,
}

/// Advisory for the latest record: the cycle-day column when the table has
/// one, else the record date's day of month. Never guesses past a bad cell.
pub fn resolve_advisory(table: &Table, columns: &ResolvedColumns, phases: &PhaseTable) -> Advisory {
    let Some(latest) = table.latest() else {
        return unknown_advisory(DaySource::Unavailable, "table has no rows");
    };

    if let Ok(column) = columns.column(MetricKind::CycleDay) {
        let raw = latest.cell(column).map(|c| c.display()).unwrap_or_default();
        let advice = phases.advise_from_raw(&raw);
        if advice.is_unknown() {
            return unknown_advisory(
                DaySource::CycleColumn,
                &format!("cycle day cell {:?} is not parseable", raw),
            );
        }
        return Advisory {
            advice,
            source: DaySource::CycleColumn,
        };
    }

    match latest.date {
        Some(date) => Advisory {
            advice: phases.advise(i64::from(date.day() % CYCLE_LENGTH)),
            source: DaySource::CalendarHeuristic,
        },
        None => unknown_advisory(DaySource::Unavailable, "latest record has no date"),
    }
}

fn unknown_advisory(source: DaySource, detail: &str) -> Advisory {
    log_soft_failure(
        Domain::Advisory,
        ErrorKind::UnknownCyclePhase,
        MetricKind::CycleDay.as_str(),
        detail,
    );
    Advisory {
        advice: Advice::unknown(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::columns::ColumnMap;
    use crate::table::parse_table;

    #[test]
    fn test_partition_is_total() {
        let table = PhaseTable::default();
        let mut counts = std::collections::HashMap::new();
        for d in 1..=28 {
            let advice = table.advise(d);
            assert_ne!(advice.phase, CyclePhase::Unknown);
            assert_eq!(advice.day, Some(d as u32));
            *counts.entry(advice.phase).or_insert(0) += 1;
        }
        assert_eq!(counts.values().sum::<i32>(), 28);
        assert_eq!(counts[&CyclePhase::Menstrual], 5);
        assert_eq!(counts[&CyclePhase::Follicular], 8);
        assert_eq!(counts[&CyclePhase::Ovulatory], 2);
        assert_eq!(counts[&CyclePhase::Luteal], 13);
    }

    #[test]
    fn test_phases_are_contiguous() {
        let table = PhaseTable::new([5, 13, 17]).unwrap();
        let order = [
            CyclePhase::Menstrual,
            CyclePhase::Follicular,
            CyclePhase::Ovulatory,
            CyclePhase::Luteal,
        ];
        let mut last = 0;
        for d in 1..=28 {
            let idx = order.iter().position(|p| *p == table.phase_of(d)).unwrap();
            assert!(idx >= last, "phase went backwards at day {}", d);
            last = idx;
        }
        assert_eq!(table.phase_of(17), CyclePhase::Ovulatory);
        assert_eq!(table.phase_of(18), CyclePhase::Luteal);
    }

    #[test]
    fn test_invalid_boundaries_rejected() {
        assert!(PhaseTable::new([0, 13, 15]).is_err());
        assert!(PhaseTable::new([5, 5, 15]).is_err());
        assert!(PhaseTable::new([5, 13, 28]).is_err());
        assert!(PhaseTable::parse("5,13").is_err());
        assert!(PhaseTable::parse("a,b,c").is_err());
        assert_eq!(PhaseTable::parse(" 5, 13 ,17").unwrap().ends(), [5, 13, 17]);
    }

    #[test]
    fn test_normalize_day() {
        assert_eq!(normalize_day(1), 1);
        assert_eq!(normalize_day(28), 28);
        assert_eq!(normalize_day(29), 1);
        assert_eq!(normalize_day(0), 28);
        assert_eq!(normalize_day(-1), 27);
    }

    #[test]
    fn test_advise_from_raw() {
        let table = PhaseTable::default();
        let d16 = table.advise_from_raw("D16");
        assert_eq!(d16.phase, table.advise(16).phase);
        assert_eq!(d16.day, Some(16));
        assert_eq!(table.advise_from_raw("第3天").day, Some(3));
        assert!(table.advise_from_raw("xyz").is_unknown());
        assert!(table.advise_from_raw("").is_unknown());
    }

    #[test]
    fn test_resolve_from_cycle_column() {
        let t = parse_table("Date,Cycle\n2024/1/30,D2\n2024/1/31,D3\n").unwrap().0;
        let cols = ColumnMap::default().resolve(&t);
        let adv = resolve_advisory(&t, &cols, &PhaseTable::default());
        assert_eq!(adv.source, DaySource::CycleColumn);
        assert_eq!(adv.advice.day, Some(3));
        assert_eq!(adv.advice.phase, CyclePhase::Menstrual);
    }

    #[test]
    fn test_bad_cycle_cell_does_not_fall_back_to_date() {
        let t = parse_table("Date,Cycle\n2024/1/3,??\n").unwrap().0;
        let cols = ColumnMap::default().resolve(&t);
        let adv = resolve_advisory(&t, &cols, &PhaseTable::default());
        assert!(adv.advice.is_unknown());
        assert_eq!(adv.source, DaySource::CycleColumn);
    }

    #[test]
    fn test_resolve_from_date_heuristic() {
        let t = parse_table("Date,W\n2024/1/28,55\n").unwrap().0;
        let cols = ColumnMap::default().resolve(&t);
        let adv = resolve_advisory(&t, &cols, &PhaseTable::default());
        assert_eq!(adv.source, DaySource::CalendarHeuristic);
        assert_eq!(adv.advice.day, Some(28));

        let t = parse_table("Date,W\n2024/1/30,55\n").unwrap().0;
        let adv = resolve_advisory(&t, &ColumnMap::default().resolve(&t), &PhaseTable::default());
        assert_eq!(adv.advice.day, Some(2));
    }

    #[test]
    fn test_undated_latest_is_unknown() {
        let t = parse_table("Date,W\n2024/1/3,55\nlater,54\n").unwrap().0;
        let cols = ColumnMap::default().resolve(&t);
        let adv = resolve_advisory(&t, &cols, &PhaseTable::default());
        assert!(adv.advice.is_unknown());
        assert_eq!(adv.source, DaySource::Unavailable);
    }
}
