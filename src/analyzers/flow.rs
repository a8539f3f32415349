//! Period flows, AADT, peak-hour conversion and PCE weighting.

use crate::analyzers::utility::pct;
use crate::config::AnalysisConfig;
use crate::error::{CorridorError, Result};
use crate::segment::{FlowSelector, Period, SegmentRecord, VehicleClass};

/// Absolute tolerance, scaled by `max(1, total)`, for the truck cross-check.
pub const TRUCK_TOLERANCE: f64 = 1e-6;

/// Flow of a single vehicle class in `period`: the sum of its mapped
/// columns. Columns the model does not populate count as zero.
pub fn class_flow(
    record: &SegmentRecord,
    config: &AnalysisConfig,
    period: Period,
    class: VehicleClass,
) -> f64 {
    config
        .flow_columns(period, class)
        .iter()
        .map(|column| record.field(column).unwrap_or(0.0))
        .sum()
}

pub fn period_flow(
    record: &SegmentRecord,
    config: &AnalysisConfig,
    period: Period,
    selector: FlowSelector,
) -> f64 {
    VehicleClass::ALL
        .into_iter()
        .filter(|class| selector.includes(*class))
        .map(|class| class_flow(record, config, period, class))
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aadt {
    pub total: f64,
    pub auto: f64,
    pub truck: f64,
    pub truck_pct: f64,
}

/// Daily traffic summed over every configured period.
///
/// Truck AADT is the sum of the truck subclasses and must agree with
/// total minus auto.
pub fn aadt(record: &SegmentRecord, config: &AnalysisConfig) -> Result<Aadt> {
    let daily = |selector| -> f64 {
        config
            .periods
            .iter()
            .map(|def| period_flow(record, config, def.period, selector))
            .sum()
    };

    let total = daily(FlowSelector::Total);
    let auto = daily(FlowSelector::Auto);
    let truck = daily(FlowSelector::Truck);

    check_truck_split(&record.id, total, auto, truck)?;

    Ok(Aadt {
        total,
        auto,
        truck,
        truck_pct: pct(truck, total),
    })
}

/// Checks that `truck` equals `total - auto` within a relative tolerance.
///
/// Period totals are summed from the same class flows, so this only fails
/// when [`FlowSelector::includes`] stops splitting the classes into auto
/// and truck, or when a total is supplied from elsewhere.
pub fn check_truck_split(id: &str, total: f64, auto: f64, truck: f64) -> Result<()> {
    if ((total - auto) - truck).abs() > TRUCK_TOLERANCE * total.max(1.0) {
        return Err(CorridorError::InconsistentTruckFlow {
            id: id.to_string(),
            total,
            auto,
            truck,
        });
    }
    Ok(())
}

/// Scales a period flow to its peak hour.
pub fn to_peak_hour(config: &AnalysisConfig, period: Period, period_flow: f64) -> Result<f64> {
    let factor = config
        .peak_factor(period)?
        .ok_or(CorridorError::UnsupportedPeriod(period))?;
    Ok(period_flow * factor)
}

pub fn peak_flow(
    record: &SegmentRecord,
    config: &AnalysisConfig,
    period: Period,
    selector: FlowSelector,
) -> Result<f64> {
    to_peak_hour(config, period, period_flow(record, config, period, selector))
}

/// Passenger-car-equivalent flow of a set of per-class flows.
pub fn pce_flow(
    config: &AnalysisConfig,
    flows: impl IntoIterator<Item = (VehicleClass, f64)>,
) -> Result<f64> {
    flows
        .into_iter()
        .map(|(class, flow)| config.pce_weight(class).map(|weight| flow * weight))
        .sum()
}

/// PCE-weighted peak-hour flow of one segment.
pub fn peak_pce_flow(
    record: &SegmentRecord,
    config: &AnalysisConfig,
    period: Period,
) -> Result<f64> {
    let mut flows = Vec::with_capacity(VehicleClass::ALL.len());
    for class in VehicleClass::ALL {
        let flow = peak_flow(record, config, period, FlowSelector::Class(class))?;
        flows.push((class, flow));
    }
    pce_flow(config, flows)
}
