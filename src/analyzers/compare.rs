use serde::Serialize;
use tracing::info;

use crate::analyzers::aggregate::{GroupValue, Reduction, all_groups};
use crate::analyzers::types::{AnnotatedTable, Metric};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::segment::{Direction, FacilityType};

/// Mean daily traffic of one group in two model years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearComparison {
    pub direction: Direction,
    pub facility: FacilityType,
    pub base_year: u16,
    pub forecast_year: u16,
    pub base_aadt: GroupValue,
    pub forecast_aadt: GroupValue,
    pub growth_pct: Option<f64>,
}

/// Growth from `base` to `forecast` in percent. Undefined for a zero or
/// missing base.
pub fn growth_pct(base: GroupValue, forecast: GroupValue) -> Option<f64> {
    match (base.value(), forecast.value()) {
        (Some(base), Some(forecast)) if base != 0.0 => Some((forecast - base) / base * 100.0),
        _ => None,
    }
}

/// Compares mean TOTAL_AADT per configured group between two annotated
/// tables of the same section.
pub fn compare_years(
    base: &AnnotatedTable,
    forecast: &AnnotatedTable,
    base_year: u16,
    forecast_year: u16,
    config: &AnalysisConfig,
) -> Result<Vec<YearComparison>> {
    let before = all_groups(base, config, Metric::TotalAadt, Reduction::Mean)?;
    let after = all_groups(forecast, config, Metric::TotalAadt, Reduction::Mean)?;

    let comparisons: Vec<YearComparison> = before
        .into_iter()
        .zip(after)
        .filter(|(b, f)| b.num_segments > 0 || f.num_segments > 0)
        .map(|(b, f)| YearComparison {
            direction: b.key.direction,
            facility: b.key.facility,
            base_year,
            forecast_year,
            base_aadt: b.value,
            forecast_aadt: f.value,
            growth_pct: growth_pct(b.value, f.value),
        })
        .collect();

    info!(base_year, forecast_year, groups = comparisons.len(), "Years compared");
    Ok(comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::AnnotatedSegment;
    use crate::metrics::SegmentMetrics;
    use crate::segment::SegmentRecord;

    fn table(rows: &[(Direction, f64)]) -> AnnotatedTable {
        let config = AnalysisConfig::default();
        let segments = rows
            .iter()
            .enumerate()
            .map(|(i, (direction, flow))| {
                let record =
                    SegmentRecord::new(&i.to_string(), 1.0, *direction, FacilityType::MainLane)
                        .with_value("AB_FLOW_DA", *flow)
                        .with_value("AB_AMLANES", 2.0);
                let metrics = SegmentMetrics::from_segment(&record, &config).unwrap();
                AnnotatedSegment { record, metrics }
            })
            .collect();
        AnnotatedTable {
            headers: vec![],
            segments,
            warnings: vec![],
        }
    }

    #[test]
    fn test_growth_pct() {
        let g = growth_pct(GroupValue::Value(1000.0), GroupValue::Value(1250.0));
        assert_eq!(g, Some(25.0));
        assert_eq!(growth_pct(GroupValue::Value(0.0), GroupValue::Value(10.0)), None);
        assert_eq!(growth_pct(GroupValue::NoData, GroupValue::Value(10.0)), None);
    }

    #[test]
    fn test_compare_years() {
        let config = AnalysisConfig::default();
        let base = table(&[(Direction::North, 1000.0), (Direction::South, 0.0)]);
        let forecast = table(&[
            (Direction::North, 1500.0),
            (Direction::South, 200.0),
            (Direction::East, 50.0),
        ]);

        let comparisons = compare_years(&base, &forecast, 2019, 2045, &config).unwrap();
        assert_eq!(comparisons.len(), 3);

        let north = &comparisons[0];
        assert_eq!(north.direction, Direction::North);
        assert_eq!(north.base_year, 2019);
        assert_eq!(north.growth_pct, Some(50.0));

        let south = &comparisons[1];
        assert_eq!(south.base_aadt, GroupValue::Value(0.0));
        assert_eq!(south.growth_pct, None);

        let east = &comparisons[2];
        assert!(east.base_aadt.is_no_data());
        assert_eq!(east.growth_pct, None);
    }
}
