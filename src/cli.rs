//! # Index Report Aggregator CLI
//!
//! Command-line front end for the bucketing engine and the category mapping
//! step.
//!
//! ## Usage
//!
//! ```bash
//! # Aggregate a single export (writes merged_index_aggregations.csv)
//! $ index_report_aggregator aggregate raw_index_report.csv
//!
//! # Aggregate a single export to a chosen file
//! $ index_report_aggregator aggregate raw_index_report.csv -o out/merged.csv
//!
//! # Aggregate every CSV export in a directory into a report directory
//! $ index_report_aggregator aggregate --directory exports/ -o reports
//!
//! # Attach lifestyle categories to each attribute row
//! $ index_report_aggregator categorize raw_index_report.csv --mapping master_mapping.csv
//! ```
//!
//! ## Generated Reports
//!
//! In directory mode each export produces
//! `[basename]_index_aggregations_[timestamp].csv` in the output directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::category_map::{CategoryMapOptions, attach_categories, load_category_map, write_categorized_csv};
use crate::merge::{MergedReport, merge, render_text_table, write_csv_file};
use crate::registry::{DimensionRegistry, GenderGrouping, RegistryOptions, UnmappedPolicy};
use crate::source::{
    DEFAULT_ATTRIBUTE_COLUMN, DEFAULT_BASE_COLUMN, DEFAULT_HEADER_OFFSET, DEFAULT_PERSONA_COLUMN, SourceColumns,
    SourceOptions, load_rows,
};

const DEFAULT_MERGED_OUTPUT: &str = "merged_index_aggregations.csv";
const DEFAULT_REPORT_DIRECTORY: &str = "reports";
const DEFAULT_CATEGORIZED_OUTPUT: &str = "categorized_index_report.csv";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Rolls Index Report attribute rows up into demographic buckets with index values"
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bucket and index every demographic dimension
    Aggregate(AggregateArgs),
    /// Attach categories from a mapping file to each attribute row
    Categorize(CategorizeArgs),
}

/// Column names and header position of the Index Report export
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Header of the attribute name column
    #[arg(long, default_value = DEFAULT_ATTRIBUTE_COLUMN)]
    pub attribute_column: String,

    /// Header of the persona proportion column
    #[arg(long, default_value = DEFAULT_PERSONA_COLUMN)]
    pub persona_column: String,

    /// Header of the baseline proportion column
    #[arg(long, default_value = DEFAULT_BASE_COLUMN)]
    pub base_column: String,

    /// Lines above the header row
    #[arg(long, default_value_t = DEFAULT_HEADER_OFFSET)]
    pub header_offset: usize,
}

impl SourceArgs {
    pub fn to_options(&self) -> SourceOptions {
        SourceOptions {
            columns: SourceColumns {
                attribute: self.attribute_column.clone(),
                persona: self.persona_column.clone(),
                base: self.base_column.clone(),
            },
            header_offset: self.header_offset,
        }
    }
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// CSV export of the Index Report sheet
    #[arg(required_unless_present = "directory", conflicts_with = "directory")]
    pub input: Option<PathBuf>,

    /// Process every .csv file in this directory instead of a single file
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Output file (single file mode) or output directory (directory mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Group gender rows into Male/Female/Both instead of by full attribute name
    #[arg(long)]
    pub canonical_gender: bool,

    /// Collect unrecognised education levels in an "Unmapped" bucket instead of dropping them
    #[arg(long)]
    pub surface_unmapped: bool,

    /// Evaluate dimensions on worker threads
    #[arg(long)]
    pub parallel: bool,

    /// Do not print the report table
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub source: SourceArgs,
}

impl AggregateArgs {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            gender_grouping: if self.canonical_gender {
                GenderGrouping::Label
            } else {
                GenderGrouping::AttributeName
            },
            unmapped_policy: if self.surface_unmapped {
                UnmappedPolicy::Bucket
            } else {
                UnmappedPolicy::Drop
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct CategorizeArgs {
    /// CSV export of the Index Report sheet
    pub input: PathBuf,

    /// CSV mapping of attribute names to categories
    #[arg(long)]
    pub mapping: PathBuf,

    /// Header of the attribute name column in the mapping file
    #[arg(long, default_value = DEFAULT_ATTRIBUTE_COLUMN)]
    pub mapping_attribute_column: String,

    /// Header of the category column in the mapping file
    #[arg(long, default_value = crate::category_map::DEFAULT_CATEGORY_COLUMN)]
    pub category_column: String,

    /// Lines above the header row of the mapping file
    #[arg(long, default_value_t = 0)]
    pub mapping_header_offset: usize,

    /// Output CSV path
    #[arg(short, long, default_value = DEFAULT_CATEGORIZED_OUTPUT)]
    pub output: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,
}

/// Loads one export, runs every dimension, and merges the results.
///
/// # Arguments
///
/// * `input_file_path` - Path to the CSV export
/// * `source_options` - Column names and header offset
/// * `registry` - Dimension rules to evaluate
/// * `parallel` - Evaluate dimensions on worker threads
///
/// # Returns
///
/// * `Result<MergedReport>` - The merged report, or the load error with the file path attached
pub fn build_report(
    input_file_path: impl AsRef<Path>,
    source_options: &SourceOptions,
    registry: &DimensionRegistry,
    parallel: bool,
) -> Result<MergedReport> {
    let input_file_path = input_file_path.as_ref();
    let rows = load_rows(input_file_path, source_options)
        .with_context(|| format!("Failed to load index report: {}", input_file_path.display()))?;

    let results = if parallel {
        registry.run_parallel(&rows)
    } else {
        registry.run(&rows)
    };

    Ok(merge(&results))
}

/// Extracts the basename from a file path, dropping only the final extension.
///
/// # Arguments
///
/// * `file_path` - The file path to extract basename from
///
/// # Returns
///
/// * `Result<String>` - The basename without extension or an error
fn extract_basename(file_path: impl AsRef<Path>) -> Result<String> {
    let path_ref = file_path.as_ref();

    let stem = path_ref
        .file_stem()
        .with_context(|| format!("Invalid file path: {:?}", path_ref))?;

    Ok(stem.to_string_lossy().to_string())
}

/// Picks a report path in `output_directory` that no earlier file of this
/// batch has claimed, numbering repeats `_2`, `_3`, ...
fn unique_report_path(
    output_directory: &Path,
    basename: &str,
    timestamp: &str,
    claimed: &mut HashSet<PathBuf>,
) -> PathBuf {
    let mut report_path = output_directory.join(format!("{}_index_aggregations_{}.csv", basename, timestamp));
    let mut repeat = 1;

    while claimed.contains(&report_path) {
        repeat += 1;
        report_path = output_directory.join(format!("{}_index_aggregations_{}_{}.csv", basename, timestamp, repeat));
    }

    if repeat > 1 {
        warn!(
            basename,
            report = %report_path.display(),
            "report name already used in this batch, numbering it"
        );
    }

    claimed.insert(report_path.clone());
    report_path
}

/// Generates a timestamp string for unique filenames.
fn generate_timestamp() -> Result<String> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;

    Ok(format!("{}", duration.as_secs()))
}

/// Aggregates every CSV file in a directory, one report per file.
///
/// Files are processed in name order. A file that fails is logged and skipped
/// so the remaining files still get their reports.
///
/// # Arguments
///
/// * `directory_path` - Directory containing Index Report exports
/// * `output_directory` - Directory where report files will be saved (created if missing)
/// * `source_options` - Column names and header offset
/// * `registry` - Dimension rules to evaluate
/// * `parallel` - Evaluate dimensions on worker threads
///
/// # Returns
///
/// * `Result<usize>` - Number of successfully processed files
pub fn process_directory(
    directory_path: impl AsRef<Path>,
    output_directory: impl AsRef<Path>,
    source_options: &SourceOptions,
    registry: &DimensionRegistry,
    parallel: bool,
) -> Result<usize> {
    let directory_path = directory_path.as_ref();
    let output_directory = output_directory.as_ref();

    fs::create_dir_all(output_directory)
        .with_context(|| format!("Failed to create output directory: {}", output_directory.display()))?;

    let mut csv_paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(directory_path)
        .with_context(|| format!("Failed to read directory: {}", directory_path.display()))?
    {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|extension| extension.to_string_lossy().to_lowercase() == "csv");
        if path.is_file() && is_csv {
            csv_paths.push(path);
        }
    }
    csv_paths.sort();

    let timestamp = generate_timestamp()?;
    let mut claimed_paths: HashSet<PathBuf> = HashSet::new();
    let mut processed_count = 0;

    for path in &csv_paths {
        let basename = extract_basename(path)?;
        info!(file = %path.display(), "processing index report");

        let report_path = unique_report_path(output_directory, &basename, &timestamp, &mut claimed_paths);

        let outcome = build_report(path, source_options, registry, parallel)
            .and_then(|report| write_csv_file(&report, &report_path).map_err(anyhow::Error::from));

        match outcome {
            Ok(()) => processed_count += 1,
            Err(e) => error!(file = %path.display(), "failed to aggregate index report: {:#}", e),
        }
    }

    if csv_paths.is_empty() {
        warn!(directory = %directory_path.display(), "no CSV files found");
    }

    Ok(processed_count)
}

fn run_aggregate(args: &AggregateArgs) -> Result<()> {
    let registry = DimensionRegistry::new(&args.registry_options());
    let source_options = args.source.to_options();

    match (&args.directory, &args.input) {
        (Some(directory), _) => {
            let output_directory = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIRECTORY));
            info!(
                directory = %directory.display(),
                output = %output_directory.display(),
                "aggregating all CSV files in directory"
            );

            let file_count = process_directory(directory, &output_directory, &source_options, &registry, args.parallel)?;
            info!(files = file_count, "processed CSV files from directory");
        }
        (None, Some(input)) => {
            let output = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MERGED_OUTPUT));

            let report = build_report(input, &source_options, &registry, args.parallel)?;
            write_csv_file(&report, &output)
                .with_context(|| format!("Failed to write report: {}", output.display()))?;

            if !args.quiet {
                print!("{}", render_text_table(&report));
            }
        }
        (None, None) => bail!("Missing input: pass a file path or --directory <path>"),
    }

    Ok(())
}

fn run_categorize(args: &CategorizeArgs) -> Result<()> {
    let rows = load_rows(&args.input, &args.source.to_options())
        .with_context(|| format!("Failed to load index report: {}", args.input.display()))?;

    let map_options = CategoryMapOptions {
        attribute_column: args.mapping_attribute_column.clone(),
        category_column: args.category_column.clone(),
        header_offset: args.mapping_header_offset,
    };
    let map = load_category_map(&args.mapping, &map_options)
        .with_context(|| format!("Failed to load category mapping: {}", args.mapping.display()))?;

    let categorized = attach_categories(&rows, &map);
    info!(
        input_rows = rows.len(),
        categorized_rows = categorized.len(),
        "attached categories to attribute rows"
    );

    let file = fs::File::create(&args.output)
        .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;
    write_categorized_csv(&categorized, file)
        .with_context(|| format!("Failed to write categorized rows: {}", args.output.display()))?;
    info!(path = %args.output.display(), "wrote categorized rows");

    Ok(())
}

/// Installs the global tracing subscriber.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point for the index report aggregator application.
///
/// Parses the command line, sets up logging, and dispatches to the chosen
/// subcommand. Any fatal error is logged with its full context chain and
/// turned into a failing exit code.
pub fn index_report_main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match &cli.command {
        Command::Aggregate(args) => run_aggregate(args),
        Command::Categorize(args) => run_categorize(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
