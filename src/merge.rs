//! # Report Merger
//!
//! Concatenates per-dimension results into one long-form report of whole
//! number percentages, and writes it out as CSV or as a fixed-width text table.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::aggregate::DimensionResult;
use crate::error::Result;

/// One line of the merged report.
///
/// Serialized column names are the ones downstream consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRow {
    #[serde(rename = "Aggregation Type")]
    pub dimension_name: String,
    #[serde(rename = "Attribute Name")]
    pub bucket_label: String,
    #[serde(rename = "Persona Attribute Proportion")]
    pub persona_pct: i64,
    #[serde(rename = "Base Adjusted Population Attribute Proportion")]
    pub base_pct: i64,
    /// Empty in CSV output when the index is undefined
    #[serde(rename = "Index")]
    pub index_pct: Option<i64>,
}

/// All dimensions, in registry order, each in its own bucket order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedReport {
    pub rows: Vec<MergedRow>,
}

impl MergedReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows belonging to one dimension
    pub fn dimension<'a>(&'a self, dimension_name: &'a str) -> impl Iterator<Item = &'a MergedRow> + 'a {
        self.rows.iter().filter(move |row| row.dimension_name == dimension_name)
    }
}

/// Rounds to the nearest whole number, ties to even.
pub fn round_whole(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Fraction in [0, 1] to a whole-number percentage
pub fn to_percent(fraction: f64) -> i64 {
    round_whole(fraction * 100.0)
}

/// Tags and rounds every dimension result, keeping order.
pub fn merge(results: &[DimensionResult]) -> MergedReport {
    let rows = results
        .iter()
        .flat_map(|result| {
            result.rows.iter().map(move |row| MergedRow {
                dimension_name: result.dimension_name.clone(),
                bucket_label: row.bucket_label.clone(),
                persona_pct: to_percent(row.persona_sum),
                base_pct: to_percent(row.base_sum),
                index_pct: row.index.map(round_whole),
            })
        })
        .collect();

    MergedReport { rows }
}

/// Writes the report as CSV with a header row.
pub fn write_csv<W: Write>(report: &MergedReport, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if report.is_empty() {
        // serialize() only emits headers alongside a first record
        csv_writer.write_record([
            "Aggregation Type",
            "Attribute Name",
            "Persona Attribute Proportion",
            "Base Adjusted Population Attribute Proportion",
            "Index",
        ])?;
    }

    for row in &report.rows {
        csv_writer.serialize(row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the report CSV to `output_path`, creating or truncating it.
pub fn write_csv_file(report: &MergedReport, output_path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(output_path.as_ref())?;
    write_csv(report, file)?;
    info!(path = %output_path.as_ref().display(), rows = report.len(), "wrote merged report");
    Ok(())
}

/// Renders the report as an evenly spaced text table for terminal display.
pub fn render_text_table(report: &MergedReport) -> String {
    let label_width = report
        .rows
        .iter()
        .map(|row| row.bucket_label.chars().count())
        .max()
        .unwrap_or(0)
        .max("Attribute Name".len());

    let mut table = String::new();
    table.push_str(&format!(
        "{:<20} {:<label_width$} {:>9} {:>9} {:>7}\n",
        "Aggregation Type", "Attribute Name", "Persona %", "Base %", "Index"
    ));
    table.push_str(&"-".repeat(20 + label_width + 9 + 9 + 7 + 4));
    table.push('\n');

    for row in &report.rows {
        let index = row
            .index_pct
            .map(|index| index.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        table.push_str(&format!(
            "{:<20} {:<label_width$} {:>9} {:>9} {:>7}\n",
            row.dimension_name, row.bucket_label, row.persona_pct, row.base_pct, index
        ));
    }

    table
}
