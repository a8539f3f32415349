//! Output formatting and persistence for corridor reports.
//!
//! Supports pretty-printing, JSON reports, CSV tables (optionally gzip
//! compressed) and appending to the running corridor summary.

use csv::{Writer, WriterBuilder};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::analyzer::SectionAnalysis;
use crate::analyzers::types::AnnotatedTable;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::metrics::derived_columns;

/// Name of the running summary file inside the output directory.
pub const SUMMARY_FILE: &str = "summary_all.csv";

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a report as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Writes flat records to a new CSV file, with a header row.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = records.len(), "CSV written");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    Ok(())
}

fn write_annotated_rows<W: Write>(
    out: W,
    table: &AnnotatedTable,
    config: &AnalysisConfig,
) -> Result<W> {
    let mut writer = WriterBuilder::new().from_writer(out);

    let mut header = table.headers.clone();
    header.extend(derived_columns(config));
    writer.write_record(&header)?;

    for segment in &table.segments {
        let mut row = segment.record.raw().to_vec();
        row.extend(segment.metrics.values());
        writer.write_record(&row)?;
    }
    writer.flush()?;

    writer.into_inner().map_err(|e| e.into_error().into())
}

/// Writes the input columns followed by the derived columns, one line per
/// segment. With `gzip` the file is gzip-compressed.
pub fn write_annotated_csv(
    path: &Path,
    table: &AnnotatedTable,
    config: &AnalysisConfig,
    gzip: bool,
) -> Result<()> {
    let file = File::create(path)?;
    if gzip {
        let encoder = GzEncoder::new(file, Compression::default());
        write_annotated_rows(encoder, table, config)?.finish()?;
    } else {
        write_annotated_rows(file, table, config)?;
    }
    info!(path = %path.display(), segments = table.len(), gzip, "Annotated table written");
    Ok(())
}

fn report_stem(analysis: &SectionAnalysis) -> String {
    match (analysis.year, analysis.section) {
        (Some(year), Some(section)) => format!("i5-{year}-sec{section}"),
        (Some(year), None) => format!("i5-{year}"),
        _ => "i5".to_string(),
    }
}

/// Writes every output of one section into `output_dir` and appends its
/// summary rows to [`SUMMARY_FILE`]. Returns the paths written.
pub fn write_section_outputs(
    output_dir: &Path,
    analysis: &SectionAnalysis,
    config: &AnalysisConfig,
    gzip: bool,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let stem = report_stem(analysis);
    let mut written = Vec::new();

    let annotated = output_dir.join(if gzip {
        format!("{stem}-annotated.csv.gz")
    } else {
        format!("{stem}-annotated.csv")
    });
    write_annotated_csv(&annotated, &analysis.table, config, gzip)?;
    written.push(annotated);

    let aadt = output_dir.join(format!("{stem}-aadt-groups.csv"));
    write_csv(&aadt, &analysis.aadt_groups)?;
    written.push(aadt);

    let peaks = output_dir.join(format!("{stem}-peak-groups.csv"));
    write_csv(&peaks, &analysis.peak_groups)?;
    written.push(peaks);

    if !analysis.capacity_peaks.is_empty() {
        let capacity = output_dir.join(format!("{stem}-capacity-peaks.csv"));
        write_csv(&capacity, &analysis.capacity_peaks)?;
        written.push(capacity);
    }

    if !analysis.bottlenecks.is_empty() {
        let hot = output_dir.join(format!("{stem}-bottlenecks.csv"));
        write_csv(&hot, &analysis.bottlenecks)?;
        written.push(hot);
    }

    if !analysis.high_truck_segments.is_empty() {
        let high = output_dir.join(format!("{stem}-high-truck.csv"));
        write_csv(&high, &analysis.high_truck_segments)?;
        written.push(high);
    }

    if !analysis.warnings.is_empty() {
        let warnings = output_dir.join(format!("{stem}-warnings.csv"));
        write_csv(&warnings, &analysis.warnings)?;
        written.push(warnings);
    }

    let report = output_dir.join(format!("{stem}-report.json"));
    write_json(&report, analysis)?;
    written.push(report);

    let summary = output_dir.join(SUMMARY_FILE);
    for row in &analysis.summary {
        append_record(&summary, row)?;
    }

    info!(output_dir = %output_dir.display(), files = written.len(), "Section outputs written");
    Ok(written)
}
