//! Lane capacity and volume-to-capacity ratio.

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::segment::{Period, SegmentRecord};

/// Lane count for `period`; a blank lane column counts as zero lanes.
pub fn lanes(record: &SegmentRecord, config: &AnalysisConfig, period: Period) -> Result<f64> {
    let column = config.lane_field(period)?;
    Ok(record.field(column).unwrap_or(0.0))
}

/// Hourly capacity in PCE of `num_lanes` lanes.
pub fn capacity(config: &AnalysisConfig, num_lanes: f64) -> f64 {
    num_lanes * config.capacity_per_lane
}

/// `None` when there is no capacity to compare against.
pub fn vc_ratio(pce_flow: f64, capacity: f64) -> Option<f64> {
    if capacity > 0.0 {
        Some(pce_flow / capacity)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::grade::{Los, los_from_vc};
    use crate::segment::{Direction, FacilityType};

    #[test]
    fn test_capacity_three_lanes() {
        let config = AnalysisConfig::default();
        assert_eq!(capacity(&config, 3.0), 6000.0);
        assert_eq!(capacity(&config, 0.0), 0.0);
    }

    #[test]
    fn test_vc_ratio_and_los() {
        let config = AnalysisConfig::default();
        let vc = vc_ratio(4500.0, capacity(&config, 3.0));
        assert_eq!(vc, Some(0.75));
        assert_eq!(los_from_vc(vc, &config.los_thresholds), Los::C);
    }

    #[test]
    fn test_zero_capacity_is_undefined() {
        let config = AnalysisConfig::default();
        let vc = vc_ratio(4500.0, 0.0);
        assert_eq!(vc, None);
        assert_eq!(los_from_vc(vc, &config.los_thresholds), Los::NotApplicable);
    }

    #[test]
    fn test_lanes_reads_period_column() {
        let config = AnalysisConfig::default();
        let record = SegmentRecord::new("1", 1.0, Direction::North, FacilityType::MainLane)
            .with_value("AB_PMLANES", 4.0);
        assert_eq!(lanes(&record, &config, Period::Pm).unwrap(), 4.0);
        assert_eq!(lanes(&record, &config, Period::Am).unwrap(), 0.0);
    }
}
