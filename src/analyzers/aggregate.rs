use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::analyzers::types::{AnnotatedSegment, AnnotatedTable, GroupKey, Metric};
use crate::analyzers::utility::{max, mean, min, stddev};
use crate::config::AnalysisConfig;
use crate::error::{CorridorError, Result};
use crate::segment::{Direction, FacilityType};

/// How the values of a group are reduced to one number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
    Min,
    Max,
    Count,
    StdDev,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
            Reduction::Min => "min",
            Reduction::Max => "max",
            Reduction::Count => "count",
            Reduction::StdDev => "stddev",
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reduction {
    type Err = CorridorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" | "average" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            "min" => Ok(Reduction::Min),
            "max" => Ok(Reduction::Max),
            "count" => Ok(Reduction::Count),
            "stddev" => Ok(Reduction::StdDev),
            _ => Err(CorridorError::config(format!(
                "unknown reduction '{s}', expected mean, sum, min, max, count or stddev"
            ))),
        }
    }
}

/// A reduced value, or the marker for a group with nothing measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupValue {
    Value(f64),
    NoData,
}

impl GroupValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            GroupValue::Value(v) => Some(*v),
            GroupValue::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, GroupValue::NoData)
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Value(v) => write!(f, "{v}"),
            GroupValue::NoData => f.write_str("NO DATA"),
        }
    }
}

impl Serialize for GroupValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GroupValue::Value(v) => serializer.serialize_f64(*v),
            GroupValue::NoData => serializer.serialize_none(),
        }
    }
}

/// Reduces `values`; an empty slice is [`GroupValue::NoData`] for every method.
pub fn reduce(values: &[f64], reduction: Reduction) -> GroupValue {
    if values.is_empty() {
        return GroupValue::NoData;
    }

    let value = match reduction {
        Reduction::Mean => mean(values),
        Reduction::Sum => values.iter().sum(),
        Reduction::Min => min(values).unwrap_or_default(),
        Reduction::Max => max(values).unwrap_or_default(),
        Reduction::Count => values.len() as f64,
        Reduction::StdDev => stddev(values, mean(values)),
    };
    GroupValue::Value(value)
}

/// One metric reduced over one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub key: GroupKey,
    pub metric: Metric,
    pub reduction: Reduction,
    pub num_segments: usize,
    pub value: GroupValue,
}

fn summarize<'a>(
    key: GroupKey,
    segments: impl IntoIterator<Item = &'a AnnotatedSegment>,
    metric: Metric,
    reduction: Reduction,
) -> Result<GroupSummary> {
    let mut num_segments = 0;
    let mut values = Vec::new();
    for segment in segments {
        num_segments += 1;
        // undefined ratios are skipped, not counted as zero
        if let Some(value) = metric.value(&segment.metrics)? {
            values.push(value);
        }
    }

    Ok(GroupSummary {
        key,
        metric,
        reduction,
        num_segments,
        value: reduce(&values, reduction),
    })
}

/// Reduces `metric` per (direction, facility[, period]) group present in
/// the table, ordered by key.
pub fn aggregate(
    table: &AnnotatedTable,
    metric: Metric,
    reduction: Reduction,
) -> Result<Vec<GroupSummary>> {
    let mut groups: BTreeMap<(Direction, FacilityType), Vec<&AnnotatedSegment>> = BTreeMap::new();
    for segment in &table.segments {
        groups
            .entry((segment.record.direction, segment.record.facility))
            .or_default()
            .push(segment);
    }

    groups
        .into_iter()
        .map(|((direction, facility), segments)| {
            let key = GroupKey {
                direction,
                facility,
                period: metric.period(),
            };
            summarize(key, segments, metric, reduction)
        })
        .collect()
}

/// Like [`aggregate`], but reports every configured direction × facility
/// pair, including those with no segments.
pub fn all_groups(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    metric: Metric,
    reduction: Reduction,
) -> Result<Vec<GroupSummary>> {
    let mut summaries = Vec::with_capacity(config.directions.len() * config.facility_types.len());

    for &direction in &config.directions {
        for &facility in &config.facility_types {
            let key = GroupKey {
                direction,
                facility,
                period: metric.period(),
            };
            let summary = summarize(key, table.group(direction, facility), metric, reduction)?;
            if summary.value.is_no_data() {
                debug!(group = %key, metric = %metric, "No data for group");
            }
            summaries.push(summary);
        }
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SegmentMetrics;
    use crate::segment::{Period, SegmentRecord};

    fn segment(
        id: &str,
        direction: Direction,
        facility: FacilityType,
        auto_flow: f64,
        am_lanes: f64,
    ) -> AnnotatedSegment {
        let config = AnalysisConfig::default();
        let record = SegmentRecord::new(id, 1.0, direction, facility)
            .with_value("AB_FLOW_DA", auto_flow)
            .with_value("AB_AMLANES", am_lanes);
        let metrics = SegmentMetrics::from_segment(&record, &config).unwrap();
        AnnotatedSegment { record, metrics }
    }

    fn table() -> AnnotatedTable {
        AnnotatedTable {
            headers: vec![],
            segments: vec![
                segment("1", Direction::North, FacilityType::MainLane, 1000.0, 2.0),
                segment("2", Direction::North, FacilityType::MainLane, 3000.0, 2.0),
                segment("3", Direction::South, FacilityType::MainLane, 0.0, 0.0),
                segment("4", Direction::North, FacilityType::Hov, 500.0, 1.0),
            ],
            warnings: vec![],
        }
    }

    #[test]
    fn test_reduce_methods() {
        let values = [1.0, 2.0, 6.0];
        assert_eq!(reduce(&values, Reduction::Mean), GroupValue::Value(3.0));
        assert_eq!(reduce(&values, Reduction::Sum), GroupValue::Value(9.0));
        assert_eq!(reduce(&values, Reduction::Min), GroupValue::Value(1.0));
        assert_eq!(reduce(&values, Reduction::Max), GroupValue::Value(6.0));
        assert_eq!(reduce(&values, Reduction::Count), GroupValue::Value(3.0));
    }

    #[test]
    fn test_reduce_empty_is_no_data() {
        for reduction in [
            Reduction::Mean,
            Reduction::Sum,
            Reduction::Min,
            Reduction::Max,
            Reduction::Count,
            Reduction::StdDev,
        ] {
            let value = reduce(&[], reduction);
            assert!(value.is_no_data());
            assert_ne!(value, GroupValue::Value(0.0));
        }
    }

    #[test]
    fn test_aggregate_groups_present() {
        let summaries = aggregate(&table(), Metric::TotalAadt, Reduction::Mean).unwrap();

        assert_eq!(summaries.len(), 3);
        let n_ml = &summaries[0];
        assert_eq!(n_ml.key.direction, Direction::North);
        assert_eq!(n_ml.key.facility, FacilityType::MainLane);
        assert_eq!(n_ml.key.period, None);
        assert_eq!(n_ml.num_segments, 2);
        assert_eq!(n_ml.value, GroupValue::Value(2000.0));

        let s_ml = summaries
            .iter()
            .find(|s| s.key.direction == Direction::South)
            .unwrap();
        // measured zero, not missing
        assert_eq!(s_ml.value, GroupValue::Value(0.0));
    }

    #[test]
    fn test_aggregate_per_period_key_and_undefined_values() {
        let summaries =
            aggregate(&table(), Metric::VcRatio(Period::Am), Reduction::Mean).unwrap();

        assert!(summaries.iter().all(|s| s.key.period == Some(Period::Am)));
        let s_ml = summaries
            .iter()
            .find(|s| s.key.direction == Direction::South)
            .unwrap();
        assert_eq!(s_ml.num_segments, 1);
        assert!(s_ml.value.is_no_data());
    }

    #[test]
    fn test_all_groups_reports_empty_groups() {
        let config = AnalysisConfig::default();
        let summaries = all_groups(&table(), &config, Metric::TotalAadt, Reduction::Sum).unwrap();

        assert_eq!(summaries.len(), 8);
        let w_hv = summaries
            .iter()
            .find(|s| s.key.direction == Direction::West && s.key.facility == FacilityType::Hov)
            .unwrap();
        assert_eq!(w_hv.num_segments, 0);
        assert_eq!(w_hv.value, GroupValue::NoData);
        assert_eq!(w_hv.value.to_string(), "NO DATA");

        let n_ml = &summaries[0];
        assert_eq!(n_ml.value, GroupValue::Value(4000.0));
    }

    #[test]
    fn test_peak_metric_for_off_peak_period_fails() {
        let err = aggregate(&table(), Metric::PeakTotal(Period::Md), Reduction::Mean).unwrap_err();
        assert!(matches!(err, CorridorError::UnsupportedPeriod(Period::Md)));
    }

    #[test]
    fn test_reduction_parse() {
        assert_eq!("MEAN".parse::<Reduction>().unwrap(), Reduction::Mean);
        assert_eq!("average".parse::<Reduction>().unwrap(), Reduction::Mean);
        assert!("median".parse::<Reduction>().is_err());
    }

    #[test]
    fn test_group_summary_json_marks_no_data_as_null() {
        let summary = GroupSummary {
            key: GroupKey {
                direction: Direction::East,
                facility: FacilityType::Hov,
                period: None,
            },
            metric: Metric::TotalAadt,
            reduction: Reduction::Mean,
            num_segments: 0,
            value: GroupValue::NoData,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["direction"], "E");
        assert_eq!(json["facility"], "HV");
        assert_eq!(json["metric"], "TOTAL_AADT");
        assert!(json["value"].is_null());
    }
}
