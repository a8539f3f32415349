use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::capacity::{capacity, lanes, vc_ratio};
use crate::analyzers::flow::{aadt, peak_flow, peak_pce_flow};
use crate::analyzers::grade::{Los, los_from_vc};
use crate::analyzers::truck::{truck_intensity, truck_ratio};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::segment::{FlowSelector, Period, SegmentRecord};

/// Peak-hour figures for one period of one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakMetrics {
    pub period: Period,
    pub total: f64,
    pub auto: f64,
    pub truck: f64,
    pub pce_flow: f64,
    pub capacity: f64,
    pub vc_ratio: Option<f64>,
    pub los: Los,
    pub truck_ratio: f64,
}

/// Everything derived for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentMetrics {
    pub total_aadt: f64,
    pub auto_aadt: f64,
    pub truck_aadt: f64,
    pub truck_pct: f64,
    pub truck_intensity: f64,
    pub lanes: BTreeMap<Period, f64>,
    pub peaks: Vec<PeakMetrics>,
}

impl SegmentMetrics {
    pub fn from_segment(record: &SegmentRecord, config: &AnalysisConfig) -> Result<Self> {
        let daily = aadt(record, config)?;

        let mut period_lanes = BTreeMap::new();
        for def in &config.periods {
            period_lanes.insert(def.period, lanes(record, config, def.period)?);
        }

        let mut peaks = Vec::new();
        for period in config.peak_periods() {
            let total = peak_flow(record, config, period, FlowSelector::Total)?;
            let truck = peak_flow(record, config, period, FlowSelector::Truck)?;
            let pce_flow = peak_pce_flow(record, config, period)?;
            let capacity = capacity(config, period_lanes[&period]);
            let vc_ratio = vc_ratio(pce_flow, capacity);

            peaks.push(PeakMetrics {
                period,
                total,
                auto: peak_flow(record, config, period, FlowSelector::Auto)?,
                truck,
                pce_flow,
                capacity,
                vc_ratio,
                los: los_from_vc(vc_ratio, &config.los_thresholds),
                truck_ratio: truck_ratio(truck, total),
            });
        }

        let am_lanes = period_lanes.get(&Period::Am).copied().unwrap_or(0.0);

        Ok(SegmentMetrics {
            total_aadt: daily.total,
            auto_aadt: daily.auto,
            truck_aadt: daily.truck,
            truck_pct: daily.truck_pct,
            truck_intensity: truck_intensity(daily.truck, am_lanes),
            lanes: period_lanes,
            peaks,
        })
    }

    pub fn peak(&self, period: Period) -> Option<&PeakMetrics> {
        self.peaks.iter().find(|p| p.period == period)
    }

    /// Cell values in the order of [`derived_columns`].
    pub fn values(&self) -> Vec<String> {
        let mut cells = vec![
            self.total_aadt.to_string(),
            self.auto_aadt.to_string(),
            self.truck_aadt.to_string(),
            self.truck_pct.to_string(),
            self.truck_intensity.to_string(),
        ];
        for peak in &self.peaks {
            cells.extend([
                peak.total.to_string(),
                peak.auto.to_string(),
                peak.truck.to_string(),
                peak.pce_flow.to_string(),
                peak.capacity.to_string(),
                peak.vc_ratio.map(|vc| vc.to_string()).unwrap_or_default(),
                peak.los.to_string(),
                peak.truck_ratio.to_string(),
            ]);
        }
        cells
    }
}

/// Names of the derived columns appended to the input table.
pub fn derived_columns(config: &AnalysisConfig) -> Vec<String> {
    let mut columns: Vec<String> = [
        "TOTAL_AADT",
        "AUTO_AADT",
        "TRUCK_AADT",
        "TRUCK_PCT",
        "TRUCK_INTENSITY",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for period in config.peak_periods() {
        for suffix in [
            "PEAK_TOTAL",
            "PEAK_AUTO",
            "PEAK_TRUCK",
            "PCE_FLOW",
            "CAPACITY",
            "VC_RATIO",
            "LOS",
            "TRUCK_RATIO",
        ] {
            columns.push(format!("{period}_{suffix}"));
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Direction, FacilityType};

    fn segment() -> SegmentRecord {
        // AM: auto 2000, light 100, medium 100, heavy 200 (PCE 2000+150+200+500)
        // PM: auto 3000, no trucks
        SegmentRecord::new("100", 1.2, Direction::North, FacilityType::MainLane)
            .with_value("AB_FLOW_DA", 1500.0)
            .with_value("AB_FLOW_SR", 400.0)
            .with_value("AB_FLOW_S1", 100.0)
            .with_value("AB_FLOW_LI", 100.0)
            .with_value("AB_FLOW_ME", 100.0)
            .with_value("AB_FLOW_HE", 200.0)
            .with_value("AB_FLOW_D1", 3000.0)
            .with_value("AB_AMLANES", 3.0)
            .with_value("AB_PMLANES", 0.0)
    }

    #[test]
    fn test_from_segment() {
        let config = AnalysisConfig::default();
        let metrics = SegmentMetrics::from_segment(&segment(), &config).unwrap();

        assert_eq!(metrics.total_aadt, 5400.0);
        assert_eq!(metrics.auto_aadt, 5000.0);
        assert_eq!(metrics.truck_aadt, 400.0);
        assert!((metrics.truck_pct - 400.0 / 5400.0 * 100.0).abs() < 1e-9);
        assert!((metrics.truck_intensity - 400.0 / 3.0).abs() < 1e-9);

        let am = metrics.peak(Period::Am).unwrap();
        assert!((am.total - 2400.0 * 0.4).abs() < 1e-9);
        assert!((am.pce_flow - 2850.0 * 0.4).abs() < 1e-9);
        assert_eq!(am.capacity, 6000.0);
        assert!((am.vc_ratio.unwrap() - 0.19).abs() < 1e-9);
        assert_eq!(am.los, Los::A);
        assert!((am.truck_ratio - 400.0 / 2400.0 * 100.0).abs() < 1e-9);

        let pm = metrics.peak(Period::Pm).unwrap();
        assert_eq!(pm.capacity, 0.0);
        assert_eq!(pm.vc_ratio, None);
        assert_eq!(pm.los, Los::NotApplicable);
        assert_eq!(pm.truck_ratio, 0.0);

        assert!(metrics.peak(Period::Md).is_none());
    }

    #[test]
    fn test_from_segment_is_idempotent() {
        let config = AnalysisConfig::default();
        let record = segment();
        let first = SegmentMetrics::from_segment(&record, &config).unwrap();
        let second = SegmentMetrics::from_segment(&record, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_values_match_columns() {
        let config = AnalysisConfig::default();
        let metrics = SegmentMetrics::from_segment(&segment(), &config).unwrap();
        let columns = derived_columns(&config);
        let values = metrics.values();

        assert_eq!(columns.len(), values.len());
        let vc_idx = columns.iter().position(|c| c == "PM_VC_RATIO").unwrap();
        assert_eq!(values[vc_idx], "");
        let los_idx = columns.iter().position(|c| c == "PM_LOS").unwrap();
        assert_eq!(values[los_idx], "N/A");
    }
}
