//! Data types shared by the aggregation pipeline.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::analyzers::validate::RangeWarning;
use crate::error::{CorridorError, Result};
use crate::metrics::SegmentMetrics;
use crate::segment::{Direction, FacilityType, Period, SegmentRecord};

/// An input row together with its derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSegment {
    pub record: SegmentRecord,
    pub metrics: SegmentMetrics,
}

/// A segment table after derivation, with the range warnings raised on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotatedTable {
    pub headers: Vec<String>,
    pub segments: Vec<AnnotatedSegment>,
    pub warnings: Vec<RangeWarning>,
}

impl AnnotatedTable {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments of one (direction, facility) group, in table order.
    pub fn group(
        &self,
        direction: Direction,
        facility: FacilityType,
    ) -> impl Iterator<Item = &AnnotatedSegment> {
        self.segments
            .iter()
            .filter(move |s| s.record.direction == direction && s.record.facility == facility)
    }
}

/// A numeric column of the annotated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    TotalAadt,
    AutoAadt,
    TruckAadt,
    TruckPct,
    TruckIntensity,
    Lanes(Period),
    PeakTotal(Period),
    PeakAuto(Period),
    PeakTruck(Period),
    PceFlow(Period),
    Capacity(Period),
    VcRatio(Period),
    TruckRatio(Period),
}

impl Metric {
    /// The period component of the grouping key, for per-period metrics.
    pub fn period(&self) -> Option<Period> {
        match self {
            Metric::TotalAadt
            | Metric::AutoAadt
            | Metric::TruckAadt
            | Metric::TruckPct
            | Metric::TruckIntensity => None,
            Metric::Lanes(p)
            | Metric::PeakTotal(p)
            | Metric::PeakAuto(p)
            | Metric::PeakTruck(p)
            | Metric::PceFlow(p)
            | Metric::Capacity(p)
            | Metric::VcRatio(p)
            | Metric::TruckRatio(p) => Some(*p),
        }
    }

    /// Value for one segment. `Ok(None)` is an undefined ratio; a peak
    /// metric for a period without a peak hour is an error.
    pub fn value(&self, metrics: &SegmentMetrics) -> Result<Option<f64>> {
        let peak = |period: Period| {
            metrics
                .peak(period)
                .ok_or(CorridorError::UnsupportedPeriod(period))
        };

        let value = match self {
            Metric::TotalAadt => Some(metrics.total_aadt),
            Metric::AutoAadt => Some(metrics.auto_aadt),
            Metric::TruckAadt => Some(metrics.truck_aadt),
            Metric::TruckPct => Some(metrics.truck_pct),
            Metric::TruckIntensity => Some(metrics.truck_intensity),
            Metric::Lanes(p) => Some(metrics.lanes.get(p).copied().ok_or_else(|| {
                CorridorError::config(format!("period {p} is not configured"))
            })?),
            Metric::PeakTotal(p) => Some(peak(*p)?.total),
            Metric::PeakAuto(p) => Some(peak(*p)?.auto),
            Metric::PeakTruck(p) => Some(peak(*p)?.truck),
            Metric::PceFlow(p) => Some(peak(*p)?.pce_flow),
            Metric::Capacity(p) => Some(peak(*p)?.capacity),
            Metric::VcRatio(p) => peak(*p)?.vc_ratio,
            Metric::TruckRatio(p) => Some(peak(*p)?.truck_ratio),
        };
        Ok(value)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::TotalAadt => write!(f, "TOTAL_AADT"),
            Metric::AutoAadt => write!(f, "AUTO_AADT"),
            Metric::TruckAadt => write!(f, "TRUCK_AADT"),
            Metric::TruckPct => write!(f, "TRUCK_PCT"),
            Metric::TruckIntensity => write!(f, "TRUCK_INTENSITY"),
            Metric::Lanes(p) => write!(f, "{p}_LANES"),
            Metric::PeakTotal(p) => write!(f, "{p}_PEAK_TOTAL"),
            Metric::PeakAuto(p) => write!(f, "{p}_PEAK_AUTO"),
            Metric::PeakTruck(p) => write!(f, "{p}_PEAK_TRUCK"),
            Metric::PceFlow(p) => write!(f, "{p}_PCE_FLOW"),
            Metric::Capacity(p) => write!(f, "{p}_CAPACITY"),
            Metric::VcRatio(p) => write!(f, "{p}_VC_RATIO"),
            Metric::TruckRatio(p) => write!(f, "{p}_TRUCK_RATIO"),
        }
    }
}

impl FromStr for Metric {
    type Err = CorridorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_uppercase();
        let daily = match name.as_str() {
            "TOTAL_AADT" => Some(Metric::TotalAadt),
            "AUTO_AADT" => Some(Metric::AutoAadt),
            "TRUCK_AADT" => Some(Metric::TruckAadt),
            "TRUCK_PCT" => Some(Metric::TruckPct),
            "TRUCK_INTENSITY" => Some(Metric::TruckIntensity),
            _ => None,
        };
        if let Some(metric) = daily {
            return Ok(metric);
        }

        let unknown = || CorridorError::config(format!("unknown metric '{s}'"));
        let (period, rest) = name.split_once('_').ok_or_else(unknown)?;
        let period: Period = period.parse().map_err(|_| unknown())?;

        match rest {
            "LANES" => Ok(Metric::Lanes(period)),
            "PEAK_TOTAL" => Ok(Metric::PeakTotal(period)),
            "PEAK_AUTO" => Ok(Metric::PeakAuto(period)),
            "PEAK_TRUCK" => Ok(Metric::PeakTruck(period)),
            "PCE_FLOW" => Ok(Metric::PceFlow(period)),
            "CAPACITY" => Ok(Metric::Capacity(period)),
            "VC_RATIO" => Ok(Metric::VcRatio(period)),
            "TRUCK_RATIO" => Ok(Metric::TruckRatio(period)),
            _ => Err(unknown()),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Grouping key of a summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub direction: Direction,
    pub facility: FacilityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.direction, self.facility)?;
        if let Some(period) = self.period {
            write!(f, "-{period}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_round_trip() {
        for name in [
            "TOTAL_AADT",
            "TRUCK_PCT",
            "AM_PEAK_TOTAL",
            "PM_PCE_FLOW",
            "AM_VC_RATIO",
            "EVE_LANES",
            "PM_TRUCK_RATIO",
        ] {
            let metric: Metric = name.parse().unwrap();
            assert_eq!(metric.to_string(), name);
        }
    }

    #[test]
    fn test_metric_period() {
        assert_eq!(Metric::TotalAadt.period(), None);
        assert_eq!(Metric::VcRatio(Period::Pm).period(), Some(Period::Pm));
    }

    #[test]
    fn test_unknown_metric_is_configuration_error() {
        for name in ["SPEED", "XX_PEAK_TOTAL", "AM_SPEED"] {
            let err = name.parse::<Metric>().unwrap_err();
            assert!(matches!(err, CorridorError::Configuration(_)), "{name}");
        }
    }

    #[test]
    fn test_group_key_display() {
        let key = GroupKey {
            direction: Direction::North,
            facility: FacilityType::Hov,
            period: Some(Period::Am),
        };
        assert_eq!(key.to_string(), "N-HV-AM");
    }
}
