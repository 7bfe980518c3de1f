//! Index Report Aggregator - Main Application
//!
//! Entry point for the index report aggregator. All argument handling lives
//! in the `cli` module.
//!
//! # Usage
//!
//! ```bash
//! # Aggregate one export into merged_index_aggregations.csv
//! $ cargo run --release -- aggregate path/to/raw_index_report.csv
//!
//! # Aggregate every export in a directory
//! $ cargo run --release -- aggregate --directory path/to/exports -o reports
//! ```

use std::process::ExitCode;

use index_report_aggregator::cli::index_report_main;

/// call from module
fn main() -> ExitCode {
    index_report_main()
}
