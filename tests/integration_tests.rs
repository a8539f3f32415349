use corridor_rater::analyzers::analyzer::{analyze_section, analyze_sections, compare_section};
use corridor_rater::analyzers::grade::Los;
use corridor_rater::config::AnalysisConfig;
use corridor_rater::error::CorridorError;
use corridor_rater::loader::load_file;
use corridor_rater::output::{SUMMARY_FILE, write_section_outputs};
use corridor_rater::segment::{Direction, FacilityType, Period};
use std::fs;
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_full_section_pipeline() {
    let config = AnalysisConfig::default();
    let analysis = analyze_section(&fixtures(), 2019, 1, &config).expect("Failed to analyze section");

    assert_eq!(analysis.data.total_segments, 4);
    assert!(analysis.warnings.is_empty());

    // N-ML, N-HV and S-ML have segments
    assert_eq!(analysis.summary.len(), 3);
    let n_ml = &analysis.summary[0];
    assert_eq!((n_ml.direction, n_ml.facility), (Direction::North, FacilityType::MainLane));
    assert_eq!(n_ml.aadt, Some(34300.0));
    assert!((n_ml.vc_ratio_am.unwrap() - 4390.0 / 8000.0).abs() < 1e-9);
    assert_eq!(n_ml.los_am, Los::C);
    assert_eq!(n_ml.los_pm, Los::A);

    let s_ml = &analysis.summary[2];
    assert_eq!(s_ml.direction, Direction::South);
    assert_eq!(s_ml.segments, 2);
    assert!((s_ml.vc_ratio_am.unwrap() - (0.63 + 0.365) / 2.0).abs() < 1e-9);
    assert_eq!(s_ml.los_am, Los::B);

    let ids: Vec<&str> = analysis
        .high_truck_segments
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["202"]);

    let am = analysis
        .los_distribution
        .iter()
        .find(|d| d.period == Period::Am)
        .unwrap();
    assert_eq!(am.los_counts[&Los::C], 2);
    assert_eq!(am.los_counts[&Los::A], 1);
    assert_eq!(am.los_counts[&Los::B], 1);
    assert_eq!(am.segments_over_capacity, 0);

    // every AM and PM V/C of the fixture is below 0.85
    assert!(analysis.bottlenecks.is_empty());
    assert_eq!(analysis.capacity_peaks.len(), 3);
    assert!(analysis.high_truck_segments[0].pm_truck_ratio.is_some());

    for segment in &analysis.table.segments {
        let m = &segment.metrics;
        assert!((m.total_aadt - m.auto_aadt - m.truck_aadt).abs() < 1e-6);
        assert!((0.0..=100.0).contains(&m.truck_pct));
    }
}

#[test]
fn test_batch_skips_missing_section() {
    let config = AnalysisConfig::default();
    let analyses = analyze_sections(&fixtures(), &[2019], &[1, 9], &config);

    assert_eq!(analyses.len(), 1);
    assert_eq!(analyses[0].section, Some(1));
}

#[test]
fn test_compare_years() {
    let config = AnalysisConfig::default();
    let comparisons = compare_section(&fixtures(), 2019, 2045, 1, &config).unwrap();

    assert_eq!(comparisons.len(), 3);
    assert!((comparisons[0].growth_pct.unwrap() - 10.0).abs() < 1e-9);
    assert_eq!(comparisons[1].growth_pct, Some(0.0));
}

#[test]
fn test_config_override_changes_capacity() {
    let config = AnalysisConfig::from_json_str(r#"{ "capacity_per_lane": 2200 }"#).unwrap();
    let analysis = analyze_section(&fixtures(), 2019, 1, &config).unwrap();

    let am = analysis.table.segments[0].metrics.peak(Period::Am).unwrap();
    assert_eq!(am.capacity, 8800.0);
}

#[test]
fn test_write_outputs() {
    let config = AnalysisConfig::default();
    let analysis = analyze_section(&fixtures(), 2019, 1, &config).unwrap();
    let dir = std::env::temp_dir().join("corridor_rater_integration_outputs");
    let _ = fs::remove_dir_all(&dir);

    write_section_outputs(&dir, &analysis, &config, true).unwrap();
    write_section_outputs(&dir, &analysis, &config, true).unwrap();

    assert!(dir.join("i5-2019-sec1-annotated.csv.gz").exists());
    assert!(dir.join("i5-2019-sec1-high-truck.csv").exists());
    // header once, three rows per run
    let summary = fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
    assert_eq!(summary.lines().count(), 1 + 3 * 2);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_direct_fails_load() {
    let path = std::env::temp_dir().join("corridor_rater_missing_direct.csv");
    let original = fs::read_to_string(fixtures().join("i5-cmcp-2019-sec1.csv")).unwrap();
    fs::write(&path, original.replacen("DIRECT", "DIR", 1)).unwrap();

    let err = load_file(&path, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(&err, CorridorError::MissingFields { missing } if missing == &["DIRECT"]));

    fs::remove_file(&path).unwrap();
}
