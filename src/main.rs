//! CLI entry point for the corridor rater.
//!
//! Provides subcommands for analyzing a single segment file, one or many
//! corridor sections, comparing two model years, and printing the active
//! configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corridor_rater::analyzers::analyzer::{
    SectionAnalysis, analyze_section, analyze_sections, analyze_table, compare_section,
};
use corridor_rater::config::AnalysisConfig;
use corridor_rater::loader::load_file;
use corridor_rater::output::{print_pretty, write_csv, write_section_outputs};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "corridor_rater")]
#[command(about = "Traffic, capacity and truck analysis of freeway corridor segments", long_about = None)]
struct Cli {
    /// JSON file overriding the default analysis configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the section CSV files
    #[arg(short, long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Directory to write reports into
    #[arg(short, long, global = true, default_value = "output")]
    output_dir: PathBuf,

    /// Gzip compress the annotated segment tables
    #[arg(long, global = true, default_value_t = false)]
    gzip: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single segment CSV file
    Analyze {
        /// Path to the CSV (or .csv.gz) file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Model year recorded in the summary rows
        #[arg(long)]
        year: Option<u16>,

        /// Corridor section recorded in the summary rows
        #[arg(long)]
        section: Option<u8>,
    },
    /// Analyze one section of one model year from the data directory
    Section {
        #[arg(short, long)]
        year: u16,

        #[arg(short, long)]
        section: u8,
    },
    /// Analyze every combination of the given years and sections
    Batch {
        /// Comma-separated model years (e.g. "2019,2045")
        #[arg(long, value_delimiter = ',', required = true)]
        years: Vec<u16>,

        /// Comma-separated section numbers (e.g. "1,2,3")
        #[arg(long, value_delimiter = ',', required = true)]
        sections: Vec<u8>,
    },
    /// Compare group AADT of one section between two model years
    Compare {
        #[arg(long)]
        base_year: u16,

        #[arg(long)]
        forecast_year: u16,

        #[arg(short, long)]
        section: u8,
    },
    /// Print the active configuration as JSON
    ShowConfig,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/corridor_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("corridor_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            file,
            year,
            section,
        } => {
            let table = load_file(&file, &config)?;
            let analysis = analyze_table(&table, &config, year, section)?;
            report(&analysis, &cli.output_dir, &config, cli.gzip)?;
        }
        Commands::Section { year, section } => {
            let analysis = analyze_section(&cli.data_dir, year, section, &config)?;
            report(&analysis, &cli.output_dir, &config, cli.gzip)?;
        }
        Commands::Batch { years, sections } => {
            let analyses = analyze_sections(&cli.data_dir, &years, &sections, &config);
            if analyses.is_empty() {
                warn!("No section could be analyzed");
            }
            for analysis in &analyses {
                report(analysis, &cli.output_dir, &config, cli.gzip)?;
            }
        }
        Commands::Compare {
            base_year,
            forecast_year,
            section,
        } => {
            let comparisons =
                compare_section(&cli.data_dir, base_year, forecast_year, section, &config)?;
            for c in &comparisons {
                info!(
                    direction = c.direction.name(),
                    facility = c.facility.name(),
                    base_aadt = %c.base_aadt,
                    forecast_aadt = %c.forecast_aadt,
                    growth_pct = ?c.growth_pct,
                    "AADT growth"
                );
            }
            std::fs::create_dir_all(&cli.output_dir)?;
            let path = cli.output_dir.join(format!(
                "i5-sec{section}-compare-{base_year}-{forecast_year}.csv"
            ));
            write_csv(&path, &comparisons)?;
            info!(path = %path.display(), "Comparison written");
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Reads the configuration from `--config`, then `CORRIDOR_CONFIG`, falling
/// back to the built-in defaults.
fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("CORRIDOR_CONFIG").map(PathBuf::from));

    match path {
        Some(path) => AnalysisConfig::load(&path.to_string_lossy())
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let config = AnalysisConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Logs the headline figures of a section and writes its output files.
#[tracing::instrument(skip_all, fields(year = ?analysis.year, section = ?analysis.section))]
fn report(
    analysis: &SectionAnalysis,
    output_dir: &Path,
    config: &AnalysisConfig,
    gzip: bool,
) -> Result<()> {
    print_pretty(&analysis.aadt_summary);

    for row in &analysis.summary {
        info!(
            direction = row.direction.name(),
            facility = row.facility.name(),
            segments = row.segments,
            aadt = ?row.aadt,
            truck_pct = ?row.truck_pct,
            los_am = %row.los_am,
            los_pm = %row.los_pm,
            "Group summary"
        );
    }
    for dist in &analysis.los_distribution {
        info!(
            period = %dist.period,
            over_capacity = dist.segments_over_capacity,
            pct_over_capacity = dist.percentage_over_capacity,
            "LOS distribution"
        );
    }
    if !analysis.warnings.is_empty() {
        warn!(count = analysis.warnings.len(), "Range warnings raised");
    }

    write_section_outputs(output_dir, analysis, config, gzip)?;
    Ok(())
}
