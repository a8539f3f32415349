//! Segment records and the small closed vocabularies they are keyed by.

use crate::error::{CorridorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A time-of-day period of the travel model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "MD")]
    Md,
    #[serde(rename = "EVE")]
    Eve,
    #[serde(rename = "NT")]
    Nt,
}

impl Period {
    pub const ALL: [Period; 5] = [Period::Am, Period::Pm, Period::Md, Period::Eve, Period::Nt];

    pub fn code(&self) -> &'static str {
        match self {
            Period::Am => "AM",
            Period::Pm => "PM",
            Period::Md => "MD",
            Period::Eve => "EVE",
            Period::Nt => "NT",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Period {
    type Err = CorridorError;

    fn from_str(s: &str) -> Result<Self> {
        Period::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CorridorError::config(format!(
                    "unknown period '{s}', expected one of AM, PM, MD, EVE, NT"
                ))
            })
    }
}

/// Vehicle classes carried by the model, each with its own PCE weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Auto,
    LightHeavy,
    MediumHeavy,
    HeavyHeavy,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Auto,
        VehicleClass::LightHeavy,
        VehicleClass::MediumHeavy,
        VehicleClass::HeavyHeavy,
    ];

    pub const TRUCKS: [VehicleClass; 3] = [
        VehicleClass::LightHeavy,
        VehicleClass::MediumHeavy,
        VehicleClass::HeavyHeavy,
    ];

    pub fn is_truck(&self) -> bool {
        !matches!(self, VehicleClass::Auto)
    }

    pub fn code(&self) -> &'static str {
        match self {
            VehicleClass::Auto => "auto",
            VehicleClass::LightHeavy => "light_heavy",
            VehicleClass::MediumHeavy => "medium_heavy",
            VehicleClass::HeavyHeavy => "heavy_heavy",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for VehicleClass {
    type Err = CorridorError;

    fn from_str(s: &str) -> Result<Self> {
        VehicleClass::ALL
            .into_iter()
            .find(|c| c.code() == s.to_ascii_lowercase())
            .ok_or_else(|| CorridorError::config(format!("unknown vehicle class '{s}'")))
    }
}

/// Which vehicle classes a period-flow sum covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSelector {
    Total,
    Auto,
    Truck,
    Class(VehicleClass),
}

impl FlowSelector {
    pub fn includes(&self, class: VehicleClass) -> bool {
        match self {
            FlowSelector::Total => true,
            FlowSelector::Auto => !class.is_truck(),
            FlowSelector::Truck => class.is_truck(),
            FlowSelector::Class(c) => *c == class,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::North => "Northbound",
            Direction::South => "Southbound",
            Direction::East => "Eastbound",
            Direction::West => "Westbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.code() == s.trim())
            .ok_or_else(|| format!("unknown direction '{s}', expected N, S, E or W"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FacilityType {
    #[serde(rename = "ML")]
    MainLane,
    #[serde(rename = "HV")]
    Hov,
}

impl FacilityType {
    pub const ALL: [FacilityType; 2] = [FacilityType::MainLane, FacilityType::Hov];

    pub fn code(&self) -> &'static str {
        match self {
            FacilityType::MainLane => "ML",
            FacilityType::Hov => "HV",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FacilityType::MainLane => "Main Lanes",
            FacilityType::Hov => "HOV Lanes",
        }
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FacilityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FacilityType::ALL
            .into_iter()
            .find(|t| t.code() == s.trim())
            .ok_or_else(|| format!("unknown facility type '{s}', expected ML or HV"))
    }
}

/// One road segment for one year and section.
///
/// Identity fields are typed; the flow and lane columns named by the
/// configuration are kept as numbers addressable by column name. `raw`
/// holds the full input row so the annotated table can reproduce it.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub id: String,
    pub length: f64,
    pub direction: Direction,
    pub facility: FacilityType,
    pub year: Option<u16>,
    pub section: Option<u8>,
    pub(crate) values: HashMap<String, f64>,
    pub(crate) raw: Vec<String>,
}

impl SegmentRecord {
    pub fn new(id: &str, length: f64, direction: Direction, facility: FacilityType) -> Self {
        SegmentRecord {
            id: id.to_string(),
            length,
            direction,
            facility,
            year: None,
            section: None,
            values: HashMap::new(),
            raw: Vec::new(),
        }
    }

    /// Sets a numeric column.
    pub fn with_value(mut self, column: &str, value: f64) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn field(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }
}

/// The rows of one input file, plus its header in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentTable {
    pub headers: Vec<String>,
    pub rows: Vec<SegmentRecord>,
}

impl SegmentTable {
    pub fn new(headers: Vec<String>, rows: Vec<SegmentRecord>) -> Self {
        SegmentTable { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filter_by_direction(&self, direction: Direction) -> SegmentTable {
        self.filter(|r| r.direction == direction)
    }

    pub fn filter_by_facility(&self, facility: FacilityType) -> SegmentTable {
        self.filter(|r| r.facility == facility)
    }

    fn filter(&self, keep: impl Fn(&SegmentRecord) -> bool) -> SegmentTable {
        SegmentTable {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Segment counts per (direction, facility), for groups that have rows.
    pub fn group_sizes(&self) -> BTreeMap<(Direction, FacilityType), usize> {
        let mut sizes = BTreeMap::new();
        for row in &self.rows {
            *sizes.entry((row.direction, row.facility)).or_insert(0) += 1;
        }
        sizes
    }
}
