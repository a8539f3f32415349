//! Group summaries for the AADT, peak-hour and capacity report tables.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

use crate::analyzers::aggregate::{GroupValue, Reduction, all_groups};
use crate::analyzers::flow::to_peak_hour;
use crate::analyzers::grade::{Los, los_from_vc};
use crate::analyzers::truck::HigherPeriod;
use crate::analyzers::types::{AnnotatedTable, Metric};
use crate::analyzers::utility::{self, mean, pct};
use crate::config::AnalysisConfig;
use crate::error::{CorridorError, Result};
use crate::segment::{Direction, FacilityType, Period};

/// Collects several metrics over the same configured groups, in the
/// order `all_groups` yields them.
fn columns(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    wanted: &[(Metric, Reduction)],
) -> Result<Vec<Vec<GroupValue>>> {
    let mut out = Vec::with_capacity(wanted.len());
    for &(metric, reduction) in wanted {
        let summaries = all_groups(table, config, metric, reduction)?;
        out.push(summaries.into_iter().map(|s| s.value).collect());
    }
    Ok(out)
}

fn group_keys(config: &AnalysisConfig) -> Vec<(Direction, FacilityType)> {
    config
        .directions
        .iter()
        .flat_map(|&d| config.facility_types.iter().map(move |&f| (d, f)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AadtGroupSummary {
    pub direction: Direction,
    pub facility: FacilityType,
    pub num_segments: usize,
    pub total_aadt: GroupValue,
    pub auto_aadt: GroupValue,
    pub truck_aadt: GroupValue,
    pub truck_pct: GroupValue,
    pub min_aadt: GroupValue,
    pub max_aadt: GroupValue,
}

pub fn aadt_groups(table: &AnnotatedTable, config: &AnalysisConfig) -> Result<Vec<AadtGroupSummary>> {
    let values = columns(
        table,
        config,
        &[
            (Metric::TotalAadt, Reduction::Mean),
            (Metric::AutoAadt, Reduction::Mean),
            (Metric::TruckAadt, Reduction::Mean),
            (Metric::TruckPct, Reduction::Mean),
            (Metric::TotalAadt, Reduction::Min),
            (Metric::TotalAadt, Reduction::Max),
        ],
    )?;

    Ok(group_keys(config)
        .into_iter()
        .enumerate()
        .map(|(i, (direction, facility))| AadtGroupSummary {
            direction,
            facility,
            num_segments: table.group(direction, facility).count(),
            total_aadt: values[0][i],
            auto_aadt: values[1][i],
            truck_aadt: values[2][i],
            truck_pct: values[3][i],
            min_aadt: values[4][i],
            max_aadt: values[5][i],
        })
        .collect())
}

/// Corridor-wide AADT statistics over the non-empty groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AadtSummary {
    pub total_segments: usize,
    pub avg_aadt: Option<f64>,
    pub min_aadt: Option<f64>,
    pub max_aadt: Option<f64>,
    pub avg_truck_pct: Option<f64>,
    pub directions: usize,
    pub facilities: usize,
}

pub fn aadt_summary(groups: &[AadtGroupSummary]) -> AadtSummary {
    let measured: Vec<&AadtGroupSummary> = groups.iter().filter(|g| g.num_segments > 0).collect();
    let aadt: Vec<f64> = measured.iter().filter_map(|g| g.total_aadt.value()).collect();
    let truck_pct: Vec<f64> = measured.iter().filter_map(|g| g.truck_pct.value()).collect();

    let mut directions: Vec<Direction> = measured.iter().map(|g| g.direction).collect();
    directions.sort();
    directions.dedup();
    let mut facilities: Vec<FacilityType> = measured.iter().map(|g| g.facility).collect();
    facilities.sort();
    facilities.dedup();

    AadtSummary {
        total_segments: measured.iter().map(|g| g.num_segments).sum(),
        avg_aadt: (!aadt.is_empty()).then(|| mean(&aadt)),
        min_aadt: utility::min(&aadt),
        max_aadt: utility::max(&aadt),
        avg_truck_pct: (!truck_pct.is_empty()).then(|| mean(&truck_pct)),
        directions: directions.len(),
        facilities: facilities.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakGroupSummary {
    pub direction: Direction,
    pub facility: FacilityType,
    pub period: Period,
    pub num_segments: usize,
    pub avg_peak_total: GroupValue,
    pub avg_peak_auto: GroupValue,
    pub avg_peak_truck: GroupValue,
    pub min_peak_total: GroupValue,
    pub max_peak_total: GroupValue,
}

pub fn peak_groups(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    period: Period,
) -> Result<Vec<PeakGroupSummary>> {
    let values = columns(
        table,
        config,
        &[
            (Metric::PeakTotal(period), Reduction::Mean),
            (Metric::PeakAuto(period), Reduction::Mean),
            (Metric::PeakTruck(period), Reduction::Mean),
            (Metric::PeakTotal(period), Reduction::Min),
            (Metric::PeakTotal(period), Reduction::Max),
        ],
    )?;

    Ok(group_keys(config)
        .into_iter()
        .enumerate()
        .map(|(i, (direction, facility))| PeakGroupSummary {
            direction,
            facility,
            period,
            num_segments: table.group(direction, facility).count(),
            avg_peak_total: values[0][i],
            avg_peak_auto: values[1][i],
            avg_peak_truck: values[2][i],
            min_peak_total: values[3][i],
            max_peak_total: values[4][i],
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityGroupSummary {
    pub direction: Direction,
    pub facility: FacilityType,
    pub period: Period,
    pub num_segments: usize,
    pub avg_pce_flow: GroupValue,
    pub avg_capacity: GroupValue,
    pub avg_vc_ratio: GroupValue,
    pub min_vc_ratio: GroupValue,
    pub max_vc_ratio: GroupValue,
    pub dominant_los: Los,
    pub los_counts: BTreeMap<Los, usize>,
}

pub fn capacity_groups(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    period: Period,
) -> Result<Vec<CapacityGroupSummary>> {
    let values = columns(
        table,
        config,
        &[
            (Metric::PceFlow(period), Reduction::Mean),
            (Metric::Capacity(period), Reduction::Mean),
            (Metric::VcRatio(period), Reduction::Mean),
            (Metric::VcRatio(period), Reduction::Min),
            (Metric::VcRatio(period), Reduction::Max),
        ],
    )?;

    let mut summaries = Vec::new();
    for (i, (direction, facility)) in group_keys(config).into_iter().enumerate() {
        let mut los_counts = BTreeMap::new();
        for segment in table.group(direction, facility) {
            if let Some(peak) = segment.metrics.peak(period) {
                *los_counts.entry(peak.los).or_insert(0) += 1;
            }
        }

        summaries.push(CapacityGroupSummary {
            direction,
            facility,
            period,
            num_segments: los_counts.values().sum(),
            avg_pce_flow: values[0][i],
            avg_capacity: values[1][i],
            avg_vc_ratio: values[2][i],
            min_vc_ratio: values[3][i],
            max_vc_ratio: values[4][i],
            dominant_los: dominant_los(&los_counts),
            los_counts,
        });
    }
    Ok(summaries)
}

/// Most frequent grade; ties go to the better grade. N/A for no segments.
pub fn dominant_los(counts: &BTreeMap<Los, usize>) -> Los {
    counts
        .iter()
        .fold(None, |best: Option<(Los, usize)>, (&los, &n)| match best {
            Some((_, top)) if top >= n => best,
            _ => Some((los, n)),
        })
        .map(|(los, _)| los)
        .unwrap_or(Los::NotApplicable)
}

/// A segment running above the bottleneck V/C threshold in one peak period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub id: String,
    pub direction: Direction,
    pub facility: FacilityType,
    pub period: Period,
    pub vc_ratio: f64,
    pub los: Los,
    pub peak_total: f64,
    pub pce_flow: f64,
    pub capacity: f64,
}

/// Segments whose V/C in `period` exceeds `threshold`, highest first.
/// Segments with undefined V/C are never bottlenecks.
pub fn bottlenecks(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    period: Period,
    threshold: f64,
) -> Result<Vec<Bottleneck>> {
    if !(0.0..=3.0).contains(&threshold) {
        return Err(CorridorError::config(format!(
            "V/C threshold must be within [0, 3], got {threshold}"
        )));
    }
    to_peak_hour(config, period, 0.0)?;

    let mut found = Vec::new();
    for segment in &table.segments {
        let Some(peak) = segment.metrics.peak(period) else {
            continue;
        };
        let Some(vc_ratio) = peak.vc_ratio else {
            continue;
        };
        if vc_ratio > threshold {
            found.push(Bottleneck {
                id: segment.record.id.clone(),
                direction: segment.record.direction,
                facility: segment.record.facility,
                period,
                vc_ratio,
                los: peak.los,
                peak_total: peak.total,
                pce_flow: peak.pce_flow,
                capacity: peak.capacity,
            });
        }
    }
    found.sort_by(|a, b| b.vc_ratio.partial_cmp(&a.vc_ratio).unwrap_or(Ordering::Equal));

    info!(%period, threshold, count = found.len(), "Bottlenecks identified");
    Ok(found)
}

/// Mean AM and PM V/C of one group, side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityPeakComparison {
    pub direction: Direction,
    pub facility: FacilityType,
    pub am_vc_ratio: GroupValue,
    pub pm_vc_ratio: GroupValue,
    pub am_los: Los,
    pub pm_los: Los,
    pub vc_diff: Option<f64>,
    pub worse_period: HigherPeriod,
}

/// AM versus PM capacity use for the groups that have segments. A period
/// with no defined V/C counts as the better one.
pub fn compare_am_pm_capacity(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
) -> Result<Vec<CapacityPeakComparison>> {
    let am = capacity_groups(table, config, Period::Am)?;
    let pm = capacity_groups(table, config, Period::Pm)?;

    let comparisons = am
        .into_iter()
        .zip(pm)
        .filter(|(a, p)| a.num_segments > 0 || p.num_segments > 0)
        .map(|(a, p)| {
            let (am_vc, pm_vc) = (a.avg_vc_ratio.value(), p.avg_vc_ratio.value());
            let worse_period = match (am_vc, pm_vc) {
                (Some(x), Some(y)) => match x.partial_cmp(&y) {
                    Some(Ordering::Greater) => HigherPeriod::Am,
                    Some(Ordering::Less) => HigherPeriod::Pm,
                    _ => HigherPeriod::Equal,
                },
                (Some(_), None) => HigherPeriod::Am,
                (None, Some(_)) => HigherPeriod::Pm,
                (None, None) => HigherPeriod::Equal,
            };
            CapacityPeakComparison {
                direction: a.direction,
                facility: a.facility,
                am_vc_ratio: a.avg_vc_ratio,
                pm_vc_ratio: p.avg_vc_ratio,
                am_los: a.dominant_los,
                pm_los: p.dominant_los,
                vc_diff: am_vc.zip(pm_vc).map(|(x, y)| (x - y).abs()),
                worse_period,
            }
        })
        .collect();
    Ok(comparisons)
}

/// Share of segments in each grade for one peak period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LosDistribution {
    pub period: Period,
    pub total_segments: usize,
    pub los_counts: BTreeMap<Los, usize>,
    pub los_percentages: BTreeMap<Los, f64>,
    pub avg_vc_ratio: Option<f64>,
    pub segments_over_capacity: usize,
    pub percentage_over_capacity: f64,
}

pub fn los_distribution(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    period: Period,
) -> Result<LosDistribution> {
    // rejects periods without a peak hour
    to_peak_hour(config, period, 0.0)?;

    let mut los_counts = BTreeMap::new();
    let mut ratios = Vec::new();
    for segment in &table.segments {
        if let Some(peak) = segment.metrics.peak(period) {
            *los_counts.entry(peak.los).or_insert(0) += 1;
            ratios.extend(peak.vc_ratio);
        }
    }

    let total = table.len();
    let los_percentages = Los::GRADES
        .iter()
        .map(|los| {
            let count = los_counts.get(los).copied().unwrap_or(0);
            (*los, pct(count as f64, total as f64))
        })
        .collect();
    let over = ratios.iter().filter(|vc| **vc > 1.0).count();

    Ok(LosDistribution {
        period,
        total_segments: total,
        los_counts,
        los_percentages,
        avg_vc_ratio: (!ratios.is_empty()).then(|| mean(&ratios)),
        segments_over_capacity: over,
        percentage_over_capacity: pct(over as f64, total as f64),
    })
}

/// One row of the corridor summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub year: Option<u16>,
    pub section: Option<u8>,
    pub direction: Direction,
    pub facility: FacilityType,
    pub segments: usize,
    pub aadt: Option<f64>,
    pub truck_pct: Option<f64>,
    pub peak_am: Option<f64>,
    pub peak_pm: Option<f64>,
    pub vc_ratio_am: Option<f64>,
    pub vc_ratio_pm: Option<f64>,
    pub los_am: Los,
    pub los_pm: Los,
}

/// Summary rows for the groups that have segments.
pub fn summary_rows(
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    year: Option<u16>,
    section: Option<u8>,
) -> Result<Vec<SummaryRow>> {
    let aadt = aadt_groups(table, config)?;
    let values = columns(
        table,
        config,
        &[
            (Metric::PeakTotal(Period::Am), Reduction::Mean),
            (Metric::PeakTotal(Period::Pm), Reduction::Mean),
            (Metric::VcRatio(Period::Am), Reduction::Mean),
            (Metric::VcRatio(Period::Pm), Reduction::Mean),
        ],
    )?;
    let grade = |vc: GroupValue| los_from_vc(vc.value(), &config.los_thresholds);

    Ok(aadt
        .into_iter()
        .enumerate()
        .filter(|(_, group)| group.num_segments > 0)
        .map(|(i, group)| SummaryRow {
            year,
            section,
            direction: group.direction,
            facility: group.facility,
            segments: group.num_segments,
            aadt: group.total_aadt.value(),
            truck_pct: group.truck_pct.value(),
            peak_am: values[0][i].value(),
            peak_pm: values[1][i].value(),
            vc_ratio_am: values[2][i].value(),
            vc_ratio_pm: values[3][i].value(),
            los_am: grade(values[2][i]),
            los_pm: grade(values[3][i]),
        })
        .collect())
}
