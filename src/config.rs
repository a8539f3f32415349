//! Analysis configuration: periods, PCE weights, capacity, LOS thresholds,
//! column mapping and validation ranges.
//!
//! The built-in defaults describe the SCAG I-5 corridor model. Any subset of
//! fields can be overridden from a JSON file:
//! ```json
//! {
//!   "capacity_per_lane": 2200,
//!   "pce_weights": { "auto": 1.0, "light_heavy": 1.5, "medium_heavy": 2.0, "heavy_heavy": 3.0 }
//! }
//! ```

use crate::analyzers::grade::Los;
use crate::error::{CorridorError, Result};
use crate::segment::{Direction, FacilityType, Period, VehicleClass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Hour range, duration and optional peak-hour factor of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDefinition {
    pub period: Period,
    pub start_hour: u8,
    pub end_hour: u8,
    pub duration_hours: u8,
    #[serde(default)]
    pub peak_factor: Option<f64>,
}

/// One row of the LOS table. `upper_bound: None` is the unbounded catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LosThreshold {
    pub grade: Los,
    pub upper_bound: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationRange {
    pub min: f64,
    pub max: f64,
}

/// Names of the input columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub direction: String,
    pub facility_type: String,
    pub id: String,
    pub length: String,
    pub flows: BTreeMap<Period, BTreeMap<VehicleClass, Vec<String>>>,
    pub lanes: BTreeMap<Period, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub periods: Vec<PeriodDefinition>,
    pub pce_weights: BTreeMap<VehicleClass, f64>,
    pub capacity_per_lane: f64,
    pub los_thresholds: Vec<LosThreshold>,
    pub fields: FieldMapping,
    pub validation_ranges: BTreeMap<String, ValidationRange>,
    pub directions: Vec<Direction>,
    pub facility_types: Vec<FacilityType>,
    pub high_truck_threshold: f64,
    /// V/C above which a segment is reported as a bottleneck.
    pub bottleneck_vc_threshold: f64,
    pub input_file_pattern: String,
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn period_flows(
    auto: [&str; 3],
    light: &str,
    medium: &str,
    heavy: &str,
) -> BTreeMap<VehicleClass, Vec<String>> {
    BTreeMap::from([
        (VehicleClass::Auto, columns(&auto)),
        (VehicleClass::LightHeavy, columns(&[light])),
        (VehicleClass::MediumHeavy, columns(&[medium])),
        (VehicleClass::HeavyHeavy, columns(&[heavy])),
    ])
}

impl Default for FieldMapping {
    fn default() -> Self {
        FieldMapping {
            direction: "DIRECT".to_string(),
            facility_type: "TYPE".to_string(),
            id: "ID".to_string(),
            length: "LENGTH".to_string(),
            flows: BTreeMap::from([
                (
                    Period::Am,
                    period_flows(
                        ["AB_FLOW_DA", "AB_FLOW_SR", "AB_FLOW_S1"],
                        "AB_FLOW_LI",
                        "AB_FLOW_ME",
                        "AB_FLOW_HE",
                    ),
                ),
                (
                    Period::Pm,
                    period_flows(
                        ["AB_FLOW_D1", "AB_FLOW_S4", "AB_FLOW_S5"],
                        "AB_FLOW_L1",
                        "AB_FLOW_M1",
                        "AB_FLOW_H1",
                    ),
                ),
                (
                    Period::Md,
                    period_flows(
                        ["AB_FLOW_D2", "AB_FLOW_S8", "AB_FLOW_S9"],
                        "AB_FLOW_L2",
                        "AB_FLOW_M2",
                        "AB_FLOW_H2",
                    ),
                ),
                (
                    Period::Eve,
                    period_flows(
                        ["AB_FLOW_D3", "AB_FLOW_12", "AB_FLOW_13"],
                        "AB_FLOW_L3",
                        "AB_FLOW_M3",
                        "AB_FLOW_H3",
                    ),
                ),
                (
                    Period::Nt,
                    period_flows(
                        ["AB_FLOW_D4", "AB_FLOW_16", "AB_FLOW_17"],
                        "AB_FLOW_L4",
                        "AB_FLOW_M4",
                        "AB_FLOW_H4",
                    ),
                ),
            ]),
            lanes: BTreeMap::from([
                (Period::Am, "AB_AMLANES".to_string()),
                (Period::Pm, "AB_PMLANES".to_string()),
                (Period::Md, "AB_MDLANES".to_string()),
                (Period::Eve, "AB_EVELANE".to_string()),
                (Period::Nt, "AB_NTLANES".to_string()),
            ]),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let period = |period, start_hour, end_hour, duration_hours, peak_factor| PeriodDefinition {
            period,
            start_hour,
            end_hour,
            duration_hours,
            peak_factor,
        };
        let threshold = |grade, upper_bound| LosThreshold { grade, upper_bound };
        let range = |min, max| ValidationRange { min, max };

        AnalysisConfig {
            periods: vec![
                period(Period::Am, 6, 10, 4, Some(0.40)),
                period(Period::Pm, 15, 19, 4, Some(0.30)),
                period(Period::Md, 10, 15, 5, None),
                period(Period::Eve, 19, 23, 4, None),
                period(Period::Nt, 23, 6, 7, None),
            ],
            pce_weights: BTreeMap::from([
                (VehicleClass::Auto, 1.0),
                (VehicleClass::LightHeavy, 1.5),
                (VehicleClass::MediumHeavy, 2.0),
                (VehicleClass::HeavyHeavy, 2.5),
            ]),
            capacity_per_lane: 2000.0,
            los_thresholds: vec![
                threshold(Los::A, Some(0.35)),
                threshold(Los::B, Some(0.54)),
                threshold(Los::C, Some(0.77)),
                threshold(Los::D, Some(0.93)),
                threshold(Los::E, Some(1.00)),
                threshold(Los::F, None),
            ],
            fields: FieldMapping::default(),
            validation_ranges: BTreeMap::from([
                ("aadt".to_string(), range(0.0, 500_000.0)),
                ("peak_flow".to_string(), range(0.0, 25_000.0)),
                ("lanes".to_string(), range(1.0, 10.0)),
                ("vc_ratio".to_string(), range(0.0, 3.0)),
                ("truck_pct".to_string(), range(0.0, 100.0)),
            ]),
            directions: Direction::ALL.to_vec(),
            facility_types: FacilityType::ALL.to_vec(),
            high_truck_threshold: 15.0,
            bottleneck_vc_threshold: 0.85,
            input_file_pattern: "i5-cmcp-{year}-sec{section}.csv".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Loads overrides from a JSON file at `path` and validates the result.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CorridorError::Read {
            filepath: path.to_string(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        debug!(path, "Configuration loaded");
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn period(&self, period: Period) -> Result<&PeriodDefinition> {
        self.periods
            .iter()
            .find(|p| p.period == period)
            .ok_or_else(|| CorridorError::config(format!("period {period} is not configured")))
    }

    /// `Ok(None)` for configured periods that have no peak hour.
    pub fn peak_factor(&self, period: Period) -> Result<Option<f64>> {
        Ok(self.period(period)?.peak_factor)
    }

    /// Periods with a peak factor, in configuration order.
    pub fn peak_periods(&self) -> Vec<Period> {
        self.periods
            .iter()
            .filter(|p| p.peak_factor.is_some())
            .map(|p| p.period)
            .collect()
    }

    pub fn pce_weight(&self, class: VehicleClass) -> Result<f64> {
        self.pce_weights
            .get(&class)
            .copied()
            .ok_or_else(|| CorridorError::config(format!("no PCE weight for vehicle class {class}")))
    }

    /// Raw columns carrying `class` flow in `period`. Empty when the model
    /// has no such columns, which reads as zero flow.
    pub fn flow_columns(&self, period: Period, class: VehicleClass) -> &[String] {
        self.fields
            .flows
            .get(&period)
            .and_then(|classes| classes.get(&class))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lane_field(&self, period: Period) -> Result<&str> {
        self.fields
            .lanes
            .get(&period)
            .map(String::as_str)
            .ok_or_else(|| CorridorError::config(format!("no lane column for period {period}")))
    }

    pub fn validation_range(&self, key: &str) -> Result<ValidationRange> {
        self.validation_ranges
            .get(key)
            .copied()
            .ok_or_else(|| CorridorError::config(format!("unknown validation range '{key}'")))
    }

    pub fn section_file_name(&self, year: u16, section: u8) -> String {
        self.input_file_pattern
            .replace("{year}", &year.to_string())
            .replace("{section}", &section.to_string())
    }

    /// Checks the structural invariants the derivations rely on.
    pub fn validate(&self) -> Result<()> {
        self.validate_periods()?;

        for class in VehicleClass::ALL {
            let weight = self.pce_weight(class)?;
            if weight <= 0.0 {
                return Err(CorridorError::config(format!(
                    "PCE weight for {class} must be positive, got {weight}"
                )));
            }
        }

        if self.capacity_per_lane <= 0.0 {
            return Err(CorridorError::config(format!(
                "capacity_per_lane must be positive, got {}",
                self.capacity_per_lane
            )));
        }

        self.validate_los_thresholds()?;

        for (key, range) in &self.validation_ranges {
            if range.min > range.max {
                return Err(CorridorError::config(format!(
                    "validation range '{key}' has min {} above max {}",
                    range.min, range.max
                )));
            }
        }

        for (period, classes) in &self.fields.flows {
            let mut seen = HashSet::new();
            for column in classes.values().flatten() {
                if !seen.insert(column) {
                    return Err(CorridorError::config(format!(
                        "column {column} is mapped to more than one vehicle class in period {period}"
                    )));
                }
            }
        }

        for def in &self.periods {
            self.lane_field(def.period)?;
        }

        if self.directions.is_empty() || self.facility_types.is_empty() {
            return Err(CorridorError::config(
                "at least one direction and one facility type must be configured",
            ));
        }

        if !(0.0..=100.0).contains(&self.high_truck_threshold) {
            return Err(CorridorError::config(format!(
                "high_truck_threshold must be within [0, 100], got {}",
                self.high_truck_threshold
            )));
        }

        if !(0.0..=3.0).contains(&self.bottleneck_vc_threshold) {
            return Err(CorridorError::config(format!(
                "bottleneck_vc_threshold must be within [0, 3], got {}",
                self.bottleneck_vc_threshold
            )));
        }

        Ok(())
    }

    /// Every period defined once, and together covering each hour of the
    /// day exactly once.
    fn validate_periods(&self) -> Result<()> {
        let mut hours = [0u8; 24];

        for period in Period::ALL {
            let count = self.periods.iter().filter(|p| p.period == period).count();
            if count != 1 {
                return Err(CorridorError::config(format!(
                    "period {period} must be defined exactly once, found {count}"
                )));
            }
        }

        for def in &self.periods {
            if def.start_hour >= 24 || def.end_hour >= 24 {
                return Err(CorridorError::config(format!(
                    "period {} has hours outside 0-23",
                    def.period
                )));
            }
            let span = (def.end_hour as i16 - def.start_hour as i16).rem_euclid(24) as u8;
            if def.duration_hours == 0 || span != def.duration_hours % 24 {
                return Err(CorridorError::config(format!(
                    "period {} runs {}:00-{}:00 but declares {} hours",
                    def.period, def.start_hour, def.end_hour, def.duration_hours
                )));
            }
            if let Some(factor) = def.peak_factor {
                if !(factor > 0.0 && factor <= 1.0) {
                    return Err(CorridorError::config(format!(
                        "peak factor for {} must be within (0, 1], got {factor}",
                        def.period
                    )));
                }
            }
            for offset in 0..def.duration_hours {
                hours[(def.start_hour as usize + offset as usize) % 24] += 1;
            }
        }

        if let Some(hour) = hours.iter().position(|&n| n != 1) {
            return Err(CorridorError::config(format!(
                "periods must cover the day exactly once; hour {hour} is covered {} times",
                hours[hour]
            )));
        }

        Ok(())
    }

    fn validate_los_thresholds(&self) -> Result<()> {
        let Some((last, rest)) = self.los_thresholds.split_last() else {
            return Err(CorridorError::config("LOS threshold table is empty"));
        };
        if last.upper_bound.is_some() {
            return Err(CorridorError::config(
                "the last LOS threshold must be unbounded",
            ));
        }

        let mut previous = f64::NEG_INFINITY;
        for threshold in rest {
            let Some(bound) = threshold.upper_bound else {
                return Err(CorridorError::config(format!(
                    "only the last LOS threshold may be unbounded, {} is not last",
                    threshold.grade
                )));
            };
            if bound <= previous {
                return Err(CorridorError::config(
                    "LOS thresholds must be in ascending order",
                ));
            }
            previous = bound;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_lookups() {
        let config = AnalysisConfig::default();
        assert_eq!(config.peak_factor(Period::Am).unwrap(), Some(0.40));
        assert_eq!(config.peak_factor(Period::Pm).unwrap(), Some(0.30));
        assert_eq!(config.peak_factor(Period::Nt).unwrap(), None);
        assert_eq!(config.peak_periods(), vec![Period::Am, Period::Pm]);
        assert_eq!(config.pce_weight(VehicleClass::HeavyHeavy).unwrap(), 2.5);
        assert_eq!(config.lane_field(Period::Eve).unwrap(), "AB_EVELANE");
        assert_eq!(
            config.flow_columns(Period::Am, VehicleClass::Auto),
            &["AB_FLOW_DA", "AB_FLOW_SR", "AB_FLOW_S1"]
        );
    }

    #[test]
    fn test_unknown_range_key_is_configuration_error() {
        let config = AnalysisConfig::default();
        let err = config.validation_range("speed").unwrap_err();
        assert!(matches!(err, CorridorError::Configuration(_)));
    }

    #[test]
    fn test_missing_pce_weight_is_configuration_error() {
        let mut config = AnalysisConfig::default();
        config.pce_weights.remove(&VehicleClass::MediumHeavy);
        assert!(matches!(
            config.pce_weight(VehicleClass::MediumHeavy),
            Err(CorridorError::Configuration(_))
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlapping_periods_rejected() {
        let mut config = AnalysisConfig::default();
        config.periods[2].start_hour = 9;
        config.periods[2].duration_hours = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gap_in_periods_rejected() {
        let mut config = AnalysisConfig::default();
        config.periods[4].start_hour = 0;
        config.periods[4].duration_hours = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_los_table_must_end_unbounded() {
        let mut config = AnalysisConfig::default();
        config.los_thresholds.pop();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_los_table_must_ascend() {
        let mut config = AnalysisConfig::default();
        config.los_thresholds[1].upper_bound = Some(0.30);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_column_mapped_twice_rejected() {
        let mut config = AnalysisConfig::default();
        config
            .fields
            .flows
            .get_mut(&Period::Am)
            .unwrap()
            .insert(VehicleClass::HeavyHeavy, vec!["AB_FLOW_DA".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_override_keeps_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{ "capacity_per_lane": 2200, "pce_weights": { "auto": 1.0, "light_heavy": 1.5, "medium_heavy": 2.0, "heavy_heavy": 3.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.capacity_per_lane, 2200.0);
        assert_eq!(config.pce_weight(VehicleClass::HeavyHeavy).unwrap(), 3.0);
        assert_eq!(config.peak_factor(Period::Am).unwrap(), Some(0.40));
        assert_eq!(config.fields.direction, "DIRECT");
    }

    #[test]
    fn test_json_override_with_invalid_capacity_rejected() {
        let err = AnalysisConfig::from_json_str(r#"{ "capacity_per_lane": 0 }"#).unwrap_err();
        assert!(matches!(err, CorridorError::Configuration(_)));
    }

    #[test]
    fn test_bottleneck_threshold_bounds() {
        assert_eq!(AnalysisConfig::default().bottleneck_vc_threshold, 0.85);
        let err =
            AnalysisConfig::from_json_str(r#"{ "bottleneck_vc_threshold": 3.5 }"#).unwrap_err();
        assert!(matches!(err, CorridorError::Configuration(_)));
    }

    #[test]
    fn test_section_file_name() {
        let config = AnalysisConfig::default();
        assert_eq!(config.section_file_name(2019, 1), "i5-cmcp-2019-sec1.csv");
    }
}
