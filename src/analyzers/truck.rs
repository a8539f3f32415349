//! Truck-specific metrics: intensity, peak shares, high-truck segments and
//! fleet composition.

use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

use crate::analyzers::aggregate::{GroupValue, Reduction, all_groups};
use crate::analyzers::flow::{peak_flow, to_peak_hour};
use crate::analyzers::types::{AnnotatedTable, Metric};
use crate::analyzers::utility::{self, mean, pct};
use crate::config::AnalysisConfig;
use crate::error::{CorridorError, Result};
use crate::segment::{Direction, FacilityType, FlowSelector, Period, VehicleClass};

/// Daily trucks per lane, 0.0 when there are no lanes.
pub fn truck_intensity(truck_aadt: f64, lanes: f64) -> f64 {
    if lanes > 0.0 { truck_aadt / lanes } else { 0.0 }
}

/// Trucks as a percentage of peak-hour flow.
pub fn truck_ratio(peak_truck: f64, peak_total: f64) -> f64 {
    pct(peak_truck, peak_total)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckGroupSummary {
    pub direction: Direction,
    pub facility: FacilityType,
    pub num_segments: usize,
    pub avg_truck_aadt: GroupValue,
    pub avg_truck_pct: GroupValue,
    pub avg_truck_intensity: GroupValue,
    pub avg_peak_truck_ratio: Vec<(Period, GroupValue)>,
    pub min_truck_pct: GroupValue,
    pub max_truck_pct: GroupValue,
}

/// Truck figures for every configured direction × facility group.
pub fn truck_groups(table: &AnnotatedTable, config: &AnalysisConfig) -> Result<Vec<TruckGroupSummary>> {
    let column = |metric, reduction| all_groups(table, config, metric, reduction);

    let truck_aadt = column(Metric::TruckAadt, Reduction::Mean)?;
    let truck_pct = column(Metric::TruckPct, Reduction::Mean)?;
    let intensity = column(Metric::TruckIntensity, Reduction::Mean)?;
    let min_pct = column(Metric::TruckPct, Reduction::Min)?;
    let max_pct = column(Metric::TruckPct, Reduction::Max)?;
    let peak_periods = config.peak_periods();
    let mut ratios = Vec::with_capacity(peak_periods.len());
    for &period in &peak_periods {
        ratios.push(column(Metric::TruckRatio(period), Reduction::Mean)?);
    }

    let summaries = truck_aadt
        .iter()
        .enumerate()
        .map(|(i, group)| TruckGroupSummary {
            direction: group.key.direction,
            facility: group.key.facility,
            num_segments: group.num_segments,
            avg_truck_aadt: group.value,
            avg_truck_pct: truck_pct[i].value,
            avg_truck_intensity: intensity[i].value,
            avg_peak_truck_ratio: peak_periods
                .iter()
                .zip(&ratios)
                .map(|(period, by_group)| (*period, by_group[i].value))
                .collect(),
            min_truck_pct: min_pct[i].value,
            max_truck_pct: max_pct[i].value,
        })
        .collect();

    Ok(summaries)
}

/// Corridor-wide truck statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckSummary {
    pub total_segments: usize,
    pub avg_truck_aadt: f64,
    pub avg_truck_pct: f64,
    pub min_truck_pct: Option<f64>,
    pub max_truck_pct: Option<f64>,
    pub high_truck_threshold: f64,
    pub segments_high_truck: usize,
    pub percentage_high_truck: f64,
    pub avg_truck_intensity: f64,
    pub total_daily_truck_volume: f64,
}

pub fn truck_summary(table: &AnnotatedTable, config: &AnalysisConfig) -> TruckSummary {
    let truck_aadt: Vec<f64> = table.segments.iter().map(|s| s.metrics.truck_aadt).collect();
    let truck_pct: Vec<f64> = table.segments.iter().map(|s| s.metrics.truck_pct).collect();
    let intensity: Vec<f64> = table
        .segments
        .iter()
        .map(|s| s.metrics.truck_intensity)
        .collect();
    let threshold = config.high_truck_threshold;
    let high = truck_pct.iter().filter(|p| **p > threshold).count();

    TruckSummary {
        total_segments: table.len(),
        avg_truck_aadt: mean(&truck_aadt),
        avg_truck_pct: mean(&truck_pct),
        min_truck_pct: utility::min(&truck_pct),
        max_truck_pct: utility::max(&truck_pct),
        high_truck_threshold: threshold,
        segments_high_truck: high,
        percentage_high_truck: pct(high as f64, table.len() as f64),
        avg_truck_intensity: mean(&intensity),
        total_daily_truck_volume: truck_aadt.iter().sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighTruckSegment {
    pub id: String,
    pub direction: Direction,
    pub facility: FacilityType,
    pub truck_aadt: f64,
    pub truck_pct: f64,
    pub truck_intensity: f64,
    pub am_truck_ratio: Option<f64>,
    pub pm_truck_ratio: Option<f64>,
}

/// Segments whose truck share exceeds `threshold` percent, highest first.
pub fn high_truck_segments(table: &AnnotatedTable, threshold: f64) -> Result<Vec<HighTruckSegment>> {
    if !(0.0..=100.0).contains(&threshold) {
        return Err(CorridorError::config(format!(
            "truck percentage threshold must be within [0, 100], got {threshold}"
        )));
    }

    let mut segments: Vec<HighTruckSegment> = table
        .segments
        .iter()
        .filter(|s| s.metrics.truck_pct > threshold)
        .map(|s| HighTruckSegment {
            id: s.record.id.clone(),
            direction: s.record.direction,
            facility: s.record.facility,
            truck_aadt: s.metrics.truck_aadt,
            truck_pct: s.metrics.truck_pct,
            truck_intensity: s.metrics.truck_intensity,
            am_truck_ratio: s.metrics.peak(Period::Am).map(|p| p.truck_ratio),
            pm_truck_ratio: s.metrics.peak(Period::Pm).map(|p| p.truck_ratio),
        })
        .collect();
    segments.sort_by(|a, b| b.truck_pct.partial_cmp(&a.truck_pct).unwrap_or(Ordering::Equal));

    info!(threshold, count = segments.len(), "High truck segments identified");
    Ok(segments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HigherPeriod {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "EQUAL")]
    Equal,
}

/// Mean AM and PM peak truck flows of one group, side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckPeakComparison {
    pub direction: Direction,
    pub facility: FacilityType,
    pub avg_am_truck: f64,
    pub avg_pm_truck: f64,
    pub avg_am_truck_ratio: f64,
    pub avg_pm_truck_ratio: f64,
    pub am_as_pct_of_daily: Option<f64>,
    pub pm_as_pct_of_daily: Option<f64>,
    pub truck_peak_diff: f64,
    pub higher_truck_period: HigherPeriod,
}

/// AM versus PM truck flows for the groups that have segments.
pub fn compare_am_pm_trucks(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
) -> Result<Vec<TruckPeakComparison>> {
    let mut comparisons = Vec::new();

    for &direction in &config.directions {
        for &facility in &config.facility_types {
            let segments: Vec<_> = table.group(direction, facility).collect();
            if segments.is_empty() {
                continue;
            }

            let column = |metric: Metric| -> Result<f64> {
                let mut values = Vec::with_capacity(segments.len());
                for s in &segments {
                    values.extend(metric.value(&s.metrics)?);
                }
                Ok(mean(&values))
            };

            let am = column(Metric::PeakTruck(Period::Am))?;
            let pm = column(Metric::PeakTruck(Period::Pm))?;
            let daily = column(Metric::TruckAadt)?;
            let share = |peak: f64| (daily != 0.0).then(|| peak / daily * 100.0);

            let higher = match am.partial_cmp(&pm) {
                Some(Ordering::Greater) => HigherPeriod::Am,
                Some(Ordering::Less) => HigherPeriod::Pm,
                _ => HigherPeriod::Equal,
            };

            comparisons.push(TruckPeakComparison {
                direction,
                facility,
                avg_am_truck: am,
                avg_pm_truck: pm,
                avg_am_truck_ratio: column(Metric::TruckRatio(Period::Am))?,
                avg_pm_truck_ratio: column(Metric::TruckRatio(Period::Pm))?,
                am_as_pct_of_daily: share(am),
                pm_as_pct_of_daily: share(pm),
                truck_peak_diff: (am - pm).abs(),
                higher_truck_period: higher,
            });
        }
    }

    Ok(comparisons)
}

/// Light / medium / heavy truck split of one peak period, summed over the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruckComposition {
    pub period: Period,
    pub total_truck_flow: f64,
    pub light_heavy_flow: f64,
    pub medium_heavy_flow: f64,
    pub heavy_heavy_flow: f64,
    pub light_heavy_pct: f64,
    pub medium_heavy_pct: f64,
    pub heavy_heavy_pct: f64,
}

pub fn truck_composition(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    period: Period,
) -> Result<TruckComposition> {
    // fail early for off-peak periods, even on an empty table
    to_peak_hour(config, period, 0.0)?;

    let mut flows = [0.0; 3];
    for segment in &table.segments {
        for (slot, class) in flows.iter_mut().zip(VehicleClass::TRUCKS) {
            *slot += peak_flow(&segment.record, config, period, FlowSelector::Class(class))?;
        }
    }
    let [light, medium, heavy] = flows;
    let total = light + medium + heavy;

    Ok(TruckComposition {
        period,
        total_truck_flow: total,
        light_heavy_flow: light,
        medium_heavy_flow: medium,
        heavy_heavy_flow: heavy,
        light_heavy_pct: pct(light, total),
        medium_heavy_pct: pct(medium, total),
        heavy_heavy_pct: pct(heavy, total),
    })
}
