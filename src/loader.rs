//! CSV loading of model segment tables.
//!
//! The header is checked against the configured column mapping before any
//! row is read; every missing field is reported in one error. Flow and lane
//! cells must be non-negative numbers, and an empty cell reads as zero.

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{CorridorError, Result};
use crate::segment::{Direction, FacilityType, SegmentRecord, SegmentTable};

/// Header names that must be present, in report order, and the numeric
/// columns to read from each row.
fn check_headers(headers: &StringRecord, config: &AnalysisConfig) -> Result<Vec<String>> {
    let present: Vec<&str> = headers.iter().collect();
    let has = |name: &str| present.contains(&name);
    let fields = &config.fields;

    let mut missing = Vec::new();
    for name in [&fields.direction, &fields.facility_type, &fields.id, &fields.length] {
        if !has(name.as_str()) {
            missing.push(name.clone());
        }
    }

    let mut numeric = Vec::new();
    for def in &config.periods {
        let lane = config.lane_field(def.period)?;
        if has(lane) {
            numeric.push(lane.to_string());
        } else {
            missing.push(lane.to_string());
        }

        let mapped: Vec<&String> = fields
            .flows
            .get(&def.period)
            .map(|classes| classes.values().flatten().collect())
            .unwrap_or_default();
        let found: Vec<&String> = mapped.iter().copied().filter(|c| has(c.as_str())).collect();
        if found.is_empty() && !mapped.is_empty() {
            let names: Vec<&str> = mapped.iter().map(|c| c.as_str()).collect();
            missing.push(format!("{} flow ({})", def.period, names.join(" | ")));
        }
        numeric.extend(found.into_iter().cloned());
    }

    if !missing.is_empty() {
        return Err(CorridorError::MissingFields { missing });
    }
    Ok(numeric)
}

fn parse_number(cell: &str, row: usize, id: &str, field: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(0.0);
    }
    let invalid = |reason: String| CorridorError::InvalidValue {
        row,
        id: id.to_string(),
        field: field.to_string(),
        reason,
    };
    let value: f64 = cell
        .parse()
        .map_err(|_| invalid(format!("'{cell}' is not a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{value} is not a non-negative number")));
    }
    Ok(value)
}

/// Reads a segment table from CSV.
pub fn load_segments<R: Read>(reader: R, config: &AnalysisConfig) -> Result<SegmentTable> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let numeric = check_headers(&headers, config)?;

    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    let fields = &config.fields;
    let cell = |record: &StringRecord, name: &str| -> String {
        index
            .get(name)
            .and_then(|i| record.get(*i))
            .unwrap_or_default()
            .to_string()
    };

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let id = cell(&record, &fields.id);
        let invalid = |field: &str, reason: String| CorridorError::InvalidValue {
            row,
            id: id.clone(),
            field: field.to_string(),
            reason,
        };

        // ragged rows name the first absent (or surplus) column
        if record.len() != headers.len() {
            let field = match headers.get(record.len()) {
                Some(name) => name.to_string(),
                None => format!("column {}", headers.len() + 1),
            };
            return Err(invalid(
                &field,
                format!("row has {} cells, header has {}", record.len(), headers.len()),
            ));
        }

        let direction: Direction = cell(&record, &fields.direction)
            .parse()
            .map_err(|reason| invalid(&fields.direction, reason))?;
        let facility: FacilityType = cell(&record, &fields.facility_type)
            .parse()
            .map_err(|reason| invalid(&fields.facility_type, reason))?;
        let length = parse_number(&cell(&record, &fields.length), row, &id, &fields.length)?;

        let mut segment = SegmentRecord::new(&id, length, direction, facility);
        for column in &numeric {
            let value = parse_number(&cell(&record, column), row, &id, column)?;
            segment.values.insert(column.clone(), value);
        }
        segment.raw = record.iter().map(str::to_string).collect();
        rows.push(segment);
    }

    debug!(rows = rows.len(), columns = headers.len(), "Segment table parsed");
    Ok(SegmentTable::new(
        headers.iter().map(str::to_string).collect(),
        rows,
    ))
}

/// Loads a CSV file, gunzipping it first when the name ends in `.gz`.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_file(path: &Path, config: &AnalysisConfig) -> Result<SegmentTable> {
    let file = File::open(path).map_err(|source| CorridorError::Read {
        filepath: path.display().to_string(),
        source,
    })?;

    let table = if path.extension().is_some_and(|ext| ext == "gz") {
        load_segments(GzDecoder::new(file), config)?
    } else {
        load_segments(file, config)?
    };

    info!(segments = table.len(), "Loaded segment file");
    Ok(table)
}

/// Loads the file of one model year and corridor section from `data_dir`.
pub fn load_section(
    data_dir: &Path,
    year: u16,
    section: u8,
    config: &AnalysisConfig,
) -> Result<SegmentTable> {
    let path = data_dir.join(config.section_file_name(year, section));
    let mut table = load_file(&path, config)?;
    for row in &mut table.rows {
        row.year = Some(year);
        row.section = Some(section);
    }
    Ok(table)
}

/// Loads every listed section of `year`; missing files are skipped.
pub fn load_all_sections(
    data_dir: &Path,
    year: u16,
    sections: &[u8],
    config: &AnalysisConfig,
) -> Result<Vec<(u8, SegmentTable)>> {
    let mut tables = Vec::new();
    for &section in sections {
        let path = data_dir.join(config.section_file_name(year, section));
        if !path.exists() {
            warn!(year, section, path = %path.display(), "Section file not found, skipping");
            continue;
        }
        tables.push((section, load_section(data_dir, year, section, config)?));
    }
    Ok(tables)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSize {
    pub direction: Direction,
    pub facility: FacilityType,
    pub segments: usize,
}

/// Shape of a loaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_segments: usize,
    pub directions: Vec<Direction>,
    pub facilities: Vec<FacilityType>,
    pub groups: Vec<GroupSize>,
}

impl DataSummary {
    pub fn of(table: &SegmentTable) -> Self {
        let sizes = table.group_sizes();

        let mut directions: Vec<Direction> = sizes.keys().map(|(d, _)| *d).collect();
        directions.dedup();
        let mut facilities: Vec<FacilityType> = sizes.keys().map(|(_, f)| *f).collect();
        facilities.sort();
        facilities.dedup();

        DataSummary {
            total_segments: table.len(),
            directions,
            facilities,
            groups: sizes
                .into_iter()
                .map(|((direction, facility), segments)| GroupSize {
                    direction,
                    facility,
                    segments,
                })
                .collect(),
        }
    }
}
