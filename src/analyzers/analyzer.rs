use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

use crate::analyzers::compare::{YearComparison, compare_years};
use crate::analyzers::summary::{
    AadtGroupSummary, AadtSummary, Bottleneck, CapacityGroupSummary, CapacityPeakComparison,
    LosDistribution, PeakGroupSummary, SummaryRow, aadt_groups, aadt_summary, bottlenecks,
    capacity_groups, compare_am_pm_capacity, los_distribution, peak_groups, summary_rows,
};
use crate::analyzers::truck::{
    HighTruckSegment, TruckComposition, TruckGroupSummary, TruckPeakComparison, TruckSummary,
    compare_am_pm_trucks, high_truck_segments, truck_composition, truck_groups, truck_summary,
};
use crate::analyzers::types::{AnnotatedSegment, AnnotatedTable};
use crate::analyzers::validate::{RangeWarning, standard_checks, validate_range};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::loader::{DataSummary, load_section};
use crate::metrics::SegmentMetrics;
use crate::segment::{Period, SegmentTable};

/// Derives the metrics of every row and runs the standard range checks.
///
/// Rows are independent; the first row that fails derivation fails the
/// whole table.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn annotate(table: &SegmentTable, config: &AnalysisConfig) -> Result<AnnotatedTable> {
    let mut segments = Vec::with_capacity(table.len());
    for record in &table.rows {
        let metrics = SegmentMetrics::from_segment(record, config)?;
        segments.push(AnnotatedSegment {
            record: record.clone(),
            metrics,
        });
    }

    let mut warnings: Vec<RangeWarning> = Vec::new();
    for (metric, range_key) in standard_checks(config) {
        warnings.extend(validate_range(&segments, metric, range_key, config)?);
    }

    info!(segments = segments.len(), warnings = warnings.len(), "Table annotated");
    Ok(AnnotatedTable {
        headers: table.headers.clone(),
        segments,
        warnings,
    })
}

/// Full report for one section file.
#[derive(Debug, Clone, Serialize)]
pub struct SectionAnalysis {
    pub year: Option<u16>,
    pub section: Option<u8>,
    pub generated_at: DateTime<Utc>,
    pub data: DataSummary,
    pub aadt_groups: Vec<AadtGroupSummary>,
    pub aadt_summary: AadtSummary,
    pub peak_groups: Vec<PeakGroupSummary>,
    pub capacity_groups: Vec<CapacityGroupSummary>,
    pub capacity_peaks: Vec<CapacityPeakComparison>,
    pub bottlenecks: Vec<Bottleneck>,
    pub los_distribution: Vec<LosDistribution>,
    pub truck_groups: Vec<TruckGroupSummary>,
    pub truck_summary: TruckSummary,
    pub high_truck_segments: Vec<HighTruckSegment>,
    pub truck_peaks: Vec<TruckPeakComparison>,
    pub truck_composition: Vec<TruckComposition>,
    pub summary: Vec<SummaryRow>,
    pub warnings: Vec<RangeWarning>,
    #[serde(skip)]
    pub table: AnnotatedTable,
}

/// Annotates `table` and computes every summary of the report.
pub fn analyze_table(
    table: &SegmentTable,
    config: &AnalysisConfig,
    year: Option<u16>,
    section: Option<u8>,
) -> Result<SectionAnalysis> {
    let annotated = annotate(table, config)?;
    let peak_periods = config.peak_periods();

    let mut peaks = Vec::new();
    let mut capacity = Vec::new();
    let mut los = Vec::new();
    let mut composition = Vec::new();
    let mut hot_spots = Vec::new();
    for &period in &peak_periods {
        peaks.extend(peak_groups(&annotated, config, period)?);
        capacity.extend(capacity_groups(&annotated, config, period)?);
        los.push(los_distribution(&annotated, config, period)?);
        composition.push(truck_composition(&annotated, config, period)?);
        hot_spots.extend(bottlenecks(
            &annotated,
            config,
            period,
            config.bottleneck_vc_threshold,
        )?);
    }

    let am_and_pm = peak_periods.contains(&Period::Am) && peak_periods.contains(&Period::Pm);
    let (truck_peaks, capacity_peaks) = if am_and_pm {
        (
            compare_am_pm_trucks(&annotated, config)?,
            compare_am_pm_capacity(&annotated, config)?,
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let groups = aadt_groups(&annotated, config)?;
    Ok(SectionAnalysis {
        year,
        section,
        generated_at: Utc::now(),
        data: DataSummary::of(table),
        aadt_summary: aadt_summary(&groups),
        aadt_groups: groups,
        peak_groups: peaks,
        capacity_groups: capacity,
        capacity_peaks,
        bottlenecks: hot_spots,
        los_distribution: los,
        truck_groups: truck_groups(&annotated, config)?,
        truck_summary: truck_summary(&annotated, config),
        high_truck_segments: high_truck_segments(&annotated, config.high_truck_threshold)?,
        truck_peaks,
        truck_composition: composition,
        summary: if am_and_pm {
            summary_rows(&annotated, config, year, section)?
        } else {
            Vec::new()
        },
        warnings: annotated.warnings.clone(),
        table: annotated,
    })
}

/// Loads and analyzes one section file of `data_dir`.
#[tracing::instrument(skip(data_dir, config))]
pub fn analyze_section(
    data_dir: &Path,
    year: u16,
    section: u8,
    config: &AnalysisConfig,
) -> Result<SectionAnalysis> {
    let table = load_section(data_dir, year, section, config)?;
    let analysis = analyze_table(&table, config, Some(year), Some(section))?;
    info!(
        segments = analysis.table.len(),
        warnings = analysis.warnings.len(),
        "Section analyzed"
    );
    Ok(analysis)
}

/// Analyzes every (year, section) pair. A section that fails is logged and
/// left out; the others still run.
pub fn analyze_sections(
    data_dir: &Path,
    years: &[u16],
    sections: &[u8],
    config: &AnalysisConfig,
) -> Vec<SectionAnalysis> {
    let mut analyses = Vec::new();
    for &year in years {
        for &section in sections {
            match analyze_section(data_dir, year, section, config) {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => error!(year, section, error = %e, "Section analysis failed, skipping"),
            }
        }
    }
    info!(
        completed = analyses.len(),
        requested = years.len() * sections.len(),
        "Batch analysis complete"
    );
    analyses
}

/// Loads one section in two years and compares its group AADT.
pub fn compare_section(
    data_dir: &Path,
    base_year: u16,
    forecast_year: u16,
    section: u8,
    config: &AnalysisConfig,
) -> Result<Vec<YearComparison>> {
    let base = annotate(&load_section(data_dir, base_year, section, config)?, config)?;
    let forecast = annotate(&load_section(data_dir, forecast_year, section, config)?, config)?;
    compare_years(&base, &forecast, base_year, forecast_year, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::grade::Los;
    use crate::analyzers::types::Metric;
    use crate::error::CorridorError;
    use crate::segment::{Direction, FacilityType, SegmentRecord, VehicleClass};

    fn table() -> SegmentTable {
        let rows = vec![
            SegmentRecord::new("1", 0.4, Direction::North, FacilityType::MainLane)
                .with_value("AB_FLOW_DA", 9000.0)
                .with_value("AB_FLOW_HE", 1000.0)
                .with_value("AB_FLOW_D1", 8000.0)
                .with_value("AB_AMLANES", 3.0)
                .with_value("AB_PMLANES", 3.0)
                .with_value("AB_MDLANES", 3.0)
                .with_value("AB_EVELANE", 3.0)
                .with_value("AB_NTLANES", 3.0),
            SegmentRecord::new("2", 0.6, Direction::South, FacilityType::Hov)
                .with_value("AB_FLOW_DA", 600_000.0)
                .with_value("AB_AMLANES", 1.0)
                .with_value("AB_PMLANES", 1.0)
                .with_value("AB_MDLANES", 1.0)
                .with_value("AB_EVELANE", 1.0)
                .with_value("AB_NTLANES", 1.0),
        ];
        SegmentTable::new(vec![], rows)
    }

    #[test]
    fn test_annotate_collects_warnings() {
        let config = AnalysisConfig::default();
        let annotated = annotate(&table(), &config).unwrap();

        assert_eq!(annotated.len(), 2);
        assert!(
            annotated
                .warnings
                .iter()
                .any(|w| w.segment_id == "2" && w.column == Metric::TotalAadt.to_string())
        );
        assert!(annotated.warnings.iter().all(|w| w.segment_id == "2"));
        // the data are not modified by validation
        assert_eq!(annotated.segments[1].metrics.total_aadt, 600_000.0);
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let config = AnalysisConfig::default();
        let first = annotate(&table(), &config).unwrap();
        let second = annotate(&table(), &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_annotate_propagates_derivation_errors() {
        let mut config = AnalysisConfig::default();
        config.pce_weights.remove(&VehicleClass::HeavyHeavy);

        let err = annotate(&table(), &config).unwrap_err();
        assert!(matches!(err, CorridorError::Configuration(_)));
    }

    #[test]
    fn test_analyze_table() {
        let config = AnalysisConfig::default();
        let analysis = analyze_table(&table(), &config, Some(2019), Some(1)).unwrap();

        assert_eq!(analysis.data.total_segments, 2);
        assert_eq!(analysis.aadt_groups.len(), 8);
        assert_eq!(analysis.peak_groups.len(), 16);
        assert_eq!(analysis.los_distribution.len(), 2);
        assert_eq!(analysis.summary.len(), 2);
        assert_eq!(analysis.high_truck_segments.len(), 0);
        assert_eq!(analysis.truck_peaks.len(), 2);
        assert_eq!(analysis.capacity_peaks.len(), 2);
        // only segment 2 in the AM exceeds 0.85
        assert_eq!(analysis.bottlenecks.len(), 1);
        assert_eq!(analysis.bottlenecks[0].id, "2");
        assert_eq!(analysis.bottlenecks[0].period, Period::Am);

        let north = &analysis.summary[0];
        assert_eq!(north.direction, Direction::North);
        // AM: (9000 + 2.5 x 1000) x 0.4 / 6000
        assert!((north.vc_ratio_am.unwrap() - 4600.0 / 6000.0).abs() < 1e-9);
        assert_eq!(north.los_am, Los::C);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["year"], 2019);
        assert!(json.get("table").is_none());
        assert!(json["aadt_groups"][1]["total_aadt"].is_null());
    }

    #[test]
    fn test_analyze_sections_skips_failures() {
        let config = AnalysisConfig::default();
        let dir = std::env::temp_dir().join("corridor_rater_batch_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("i5-cmcp-2019-sec2.csv"), "ID,LENGTH\n1,0.5").unwrap();

        let analyses = analyze_sections(&dir, &[2019], &[1, 2], &config);
        assert!(analyses.is_empty());

        let err = analyze_section(&dir, 2019, 2, &config).unwrap_err();
        assert!(matches!(err, CorridorError::MissingFields { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
