use serde::Serialize;
use thiserror::Error;

use crate::engine::columns::MetricKind;

/// Failure taxonomy shared by the loader and the engine.
///
/// Only `SourceUnavailable` may turn into a full-page error state; every
/// other kind is recovered locally by the component that detects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    MalformedRow,
    InsufficientHistory,
    UnknownCyclePhase,
    UnknownColumn,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::MalformedRow => "malformed_row",
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::UnknownCyclePhase => "unknown_cycle_phase",
            ErrorKind::UnknownColumn => "unknown_column",
        }
    }
}

/// Why a sheet could not be turned into a table. All-or-nothing: a load
/// either yields a complete table or one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("invalid sheet locator: {0}")]
    InvalidLocator(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("permission denied by source (http {status})")]
    PermissionDenied { status: u16 },

    #[error("unexpected http status {status}")]
    HttpStatus { status: u16 },

    #[error("response is not tabular: {0}")]
    NotTabular(String),
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SourceUnavailable
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Network(err.to_string())
    }
}

/// Soft, per-metric failures. None of these abort a render.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricError {
    #[error("need at least 2 rows, table has {rows}")]
    InsufficientHistory { rows: usize },

    #[error("no column resolved for {metric:?}")]
    UnknownColumn { metric: MetricKind },

    #[error("column {column} row {row} is not numeric")]
    NonNumeric { column: usize, row: usize },

    #[error("progress undefined: start equals target or input not finite")]
    ProgressUndefined,
}

impl MetricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            MetricError::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            MetricError::NonNumeric { .. } | MetricError::ProgressUndefined => {
                ErrorKind::MalformedRow
            }
        }
    }
}
