//! Range checks on derived columns.
//!
//! Out-of-range values never stop a run. They are returned to the caller
//! as [`RangeWarning`]s and logged, and the data are left untouched.

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::analyzers::types::{AnnotatedSegment, Metric};
use crate::config::AnalysisConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeWarning {
    pub segment_id: String,
    pub column: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment {}: {} = {} outside [{}, {}]",
            self.segment_id, self.column, self.value, self.min, self.max
        )
    }
}

/// Checks `metric` of every segment against the range named `range_key`.
///
/// Undefined values are not checked. An unknown range key is a
/// configuration error.
pub fn validate_range<'a>(
    segments: impl IntoIterator<Item = &'a AnnotatedSegment>,
    metric: Metric,
    range_key: &str,
    config: &AnalysisConfig,
) -> Result<Vec<RangeWarning>> {
    let range = config.validation_range(range_key)?;
    let mut warnings = Vec::new();

    for segment in segments {
        let Some(value) = metric.value(&segment.metrics)? else {
            continue;
        };
        if value < range.min || value > range.max {
            warnings.push(RangeWarning {
                segment_id: segment.record.id.clone(),
                column: metric.to_string(),
                value,
                min: range.min,
                max: range.max,
            });
        }
    }

    if !warnings.is_empty() {
        warn!(
            column = %metric,
            range_key,
            count = warnings.len(),
            min = range.min,
            max = range.max,
            "Values outside validation range"
        );
    }

    Ok(warnings)
}

/// The checks run on every annotated table: AADT, truck share, lane
/// counts per period, and peak flow and V/C per peak period.
pub fn standard_checks(config: &AnalysisConfig) -> Vec<(Metric, &'static str)> {
    let mut checks = vec![(Metric::TotalAadt, "aadt"), (Metric::TruckPct, "truck_pct")];
    for def in &config.periods {
        checks.push((Metric::Lanes(def.period), "lanes"));
    }
    for period in config.peak_periods() {
        checks.push((Metric::PeakTotal(period), "peak_flow"));
        checks.push((Metric::VcRatio(period), "vc_ratio"));
    }
    checks
}
