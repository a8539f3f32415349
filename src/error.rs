//! Error taxonomy for the corridor analysis pipeline.

use crate::segment::Period;

/// Errors raised by configuration, loading and derivation.
///
/// Data-quality problems that should not stop a run (out-of-range values)
/// are not errors; they travel as [`RangeWarning`](crate::analyzers::validate::RangeWarning)s.
#[derive(thiserror::Error, Debug)]
pub enum CorridorError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("missing required fields: {}", .missing.join(", "))]
    MissingFields { missing: Vec<String> },
    #[error("invalid value in row {row} ({id}), field {field}: {reason}")]
    InvalidValue {
        row: usize,
        id: String,
        field: String,
        reason: String,
    },
    #[error("peak hour flow is not defined for period {0}")]
    UnsupportedPeriod(Period),
    #[error(
        "segment {id}: truck flow {truck} does not match total {total} minus auto {auto}"
    )]
    InconsistentTruckFlow {
        id: String,
        total: f64,
        auto: f64,
        truck: f64,
    },
    #[error("failed reading '{filepath}': {source}")]
    Read {
        filepath: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CorridorError {
    pub fn config(msg: impl Into<String>) -> Self {
        CorridorError::Configuration(msg.into())
    }

    /// True for errors raised while checking the input table, before any
    /// derivation runs.
    pub fn is_data_validation(&self) -> bool {
        matches!(
            self,
            CorridorError::MissingFields { .. } | CorridorError::InvalidValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CorridorError>;
