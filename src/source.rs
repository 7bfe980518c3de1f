//! # Row Source
//!
//! Loads the attribute rows of an Index Report export. The export is a CSV
//! rendition of the "Index Report" sheet, whose header row sits below a title
//! line, so a configurable number of leading lines are skipped before the
//! header is read.
//!
//! The three required columns are resolved once, here, by exact header name.
//! Nothing downstream looks columns up again.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::{debug, info, trace};

use crate::error::{ReportError, Result};

pub const DEFAULT_ATTRIBUTE_COLUMN: &str = "Attribute Name";
pub const DEFAULT_PERSONA_COLUMN: &str = "Persona Attribute Proportion";
pub const DEFAULT_BASE_COLUMN: &str = "Base Adjusted Population Attribute Proportion";

/// Number of lines above the header row in a raw Index Report export
pub const DEFAULT_HEADER_OFFSET: usize = 1;

/// One line item of the Index Report.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub attribute_name: String,
    /// Share of the persona holding this attribute, in [0, 1]; NaN when missing
    pub persona_proportion: f64,
    /// Share of the baseline population holding this attribute, in [0, 1]; NaN when missing
    pub base_proportion: f64,
}

impl AttributeRow {
    pub fn new(attribute_name: impl Into<String>, persona_proportion: f64, base_proportion: f64) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            persona_proportion,
            base_proportion,
        }
    }
}

/// Header names of the three required columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumns {
    pub attribute: String,
    pub persona: String,
    pub base: String,
}

impl Default for SourceColumns {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_ATTRIBUTE_COLUMN.to_string(),
            persona: DEFAULT_PERSONA_COLUMN.to_string(),
            base: DEFAULT_BASE_COLUMN.to_string(),
        }
    }
}

/// How to read a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub columns: SourceColumns,
    /// Physical lines to skip before the header row
    pub header_offset: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            columns: SourceColumns::default(),
            header_offset: DEFAULT_HEADER_OFFSET,
        }
    }
}

/// Loads all attribute rows from a CSV export on disk.
///
/// # Arguments
///
/// * `input_file_path` - Path to the CSV export of the Index Report sheet
/// * `options` - Column names and header offset
///
/// # Returns
///
/// * `Result<Vec<AttributeRow>>` - Rows in file order, or a `MissingColumns`
///   error if the header lacks any required column
pub fn load_rows(input_file_path: impl AsRef<Path>, options: &SourceOptions) -> Result<Vec<AttributeRow>> {
    let file = File::open(input_file_path.as_ref())?;
    let rows = read_rows(file, options)?;
    info!(
        path = %input_file_path.as_ref().display(),
        rows = rows.len(),
        "loaded attribute rows"
    );
    Ok(rows)
}

/// Reads attribute rows from any reader holding CSV text.
pub fn read_rows<R: Read>(reader: R, options: &SourceOptions) -> Result<Vec<AttributeRow>> {
    let mut csv_reader = csv_reader_after(reader, options.header_offset)?;

    let headers = csv_reader.headers()?.clone();
    let columns = &options.columns;
    let [attribute, persona, base] =
        require_columns(&headers, [columns.attribute.as_str(), columns.persona.as_str(), columns.base.as_str()])?;

    let mut rows = Vec::new();
    let mut missing_values = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let attribute_name = record.get(attribute).unwrap_or("").trim().to_string();
        let persona_proportion = parse_proportion(record.get(persona));
        let base_proportion = parse_proportion(record.get(base));

        if persona_proportion.is_nan() || base_proportion.is_nan() {
            missing_values += 1;
            trace!(attribute = %attribute_name, "row has a missing proportion");
        }

        rows.push(AttributeRow {
            attribute_name,
            persona_proportion,
            base_proportion,
        });
    }

    if missing_values > 0 {
        debug!(rows = missing_values, "rows with at least one missing proportion");
    }

    Ok(rows)
}

/// Skips `header_offset` physical lines, then opens a flexible CSV reader
/// whose first record is the header row.
pub(crate) fn csv_reader_after<R: Read>(reader: R, header_offset: usize) -> Result<csv::Reader<BufReader<R>>> {
    let mut buffered = BufReader::new(reader);

    // Skip the title lines above the header
    let mut skipped = String::new();
    for _ in 0..header_offset {
        skipped.clear();
        if buffered.read_line(&mut skipped)? == 0 {
            break;
        }
    }

    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(buffered))
}

/// Finds every named column in the header, reporting all that are absent at once.
pub(crate) fn require_columns<const N: usize>(headers: &csv::StringRecord, names: [&str; N]) -> Result<[usize; N]> {
    let positions = names.map(|name| headers.iter().position(|header| header.trim() == name));

    let missing: Vec<String> = names
        .iter()
        .zip(&positions)
        .filter(|(_, found)| found.is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ReportError::MissingColumns {
            columns: missing,
            available: headers.iter().map(|header| header.trim().to_string()).collect(),
        });
    }

    Ok(positions.map(|found| found.unwrap_or_default()))
}

/// Empty or unparseable cells become NaN so they drop out of sums.
fn parse_proportion(cell: Option<&str>) -> f64 {
    match cell.map(str::trim) {
        Some(text) if !text.is_empty() => text.parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}
