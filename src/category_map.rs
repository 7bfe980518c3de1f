//! # Category Mapping
//!
//! Enriches attribute rows with a category taken from a separate mapping
//! file (attribute name to category), keeping only rows that have one.
//! This sits beside the bucketing engine, not inside it.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::compute_index;
use crate::error::Result;
use crate::source::{AttributeRow, csv_reader_after, require_columns};

pub const DEFAULT_CATEGORY_COLUMN: &str = "Category";

/// Which columns of the mapping file hold the join key and the category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapOptions {
    pub attribute_column: String,
    pub category_column: String,
    /// Physical lines to skip before the header row
    pub header_offset: usize,
}

impl Default for CategoryMapOptions {
    fn default() -> Self {
        Self {
            attribute_column: crate::source::DEFAULT_ATTRIBUTE_COLUMN.to_string(),
            category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
            header_offset: 0,
        }
    }
}

/// Attribute name to categories, in first-seen order per attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    entries: HashMap<String, Vec<String>>,
    pairs: usize,
}

impl CategoryMap {
    /// Builds a map from raw pairs: trims both sides, drops pairs with an empty
    /// side, and drops repeated pairs.
    pub fn from_pairs<I, A, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut map = CategoryMap::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for (attribute, category) in pairs {
            let attribute = attribute.as_ref().trim();
            let category = category.as_ref().trim();
            if attribute.is_empty() || category.is_empty() {
                continue;
            }
            if !seen.insert((attribute.to_string(), category.to_string())) {
                continue;
            }
            map.entries
                .entry(attribute.to_string())
                .or_default()
                .push(category.to_string());
            map.pairs += 1;
        }

        map
    }

    /// Number of distinct attribute/category pairs
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    pub fn categories(&self, attribute_name: &str) -> &[String] {
        self.entries.get(attribute_name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// An attribute row that found a category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedRow {
    #[serde(rename = "Attribute Name")]
    pub attribute_name: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Persona Attribute Proportion")]
    pub persona_proportion: f64,
    #[serde(rename = "Base Adjusted Population Attribute Proportion")]
    pub base_proportion: f64,
    #[serde(rename = "Index", serialize_with = "serialize_index")]
    pub index: Option<f64>,
}

fn serialize_index<S: serde::Serializer>(index: &Option<f64>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match index {
        Some(value) => serializer.serialize_str(&format!("{:.2}", value)),
        None => serializer.serialize_str(""),
    }
}

/// Index of a single row; undefined when the baseline share is zero or missing.
pub fn row_index(persona_proportion: f64, base_proportion: f64) -> Option<f64> {
    if persona_proportion.is_nan() || base_proportion.is_nan() {
        return None;
    }
    compute_index(persona_proportion, base_proportion)
}

/// Loads a mapping file from disk.
pub fn load_category_map(mapping_file_path: impl AsRef<Path>, options: &CategoryMapOptions) -> Result<CategoryMap> {
    let file = File::open(mapping_file_path.as_ref())?;
    let map = read_category_map(file, options)?;
    info!(
        path = %mapping_file_path.as_ref().display(),
        pairs = map.len(),
        "loaded category map"
    );
    Ok(map)
}

/// Reads a mapping table from CSV text; both named columns are required.
pub fn read_category_map<R: Read>(reader: R, options: &CategoryMapOptions) -> Result<CategoryMap> {
    let mut csv_reader = csv_reader_after(reader, options.header_offset)?;
    let headers = csv_reader.headers()?.clone();
    let [attribute_index, category_index] = require_columns(
        &headers,
        [options.attribute_column.as_str(), options.category_column.as_str()],
    )?;

    let mut pairs = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        pairs.push((
            record.get(attribute_index).unwrap_or("").to_string(),
            record.get(category_index).unwrap_or("").to_string(),
        ));
    }

    Ok(CategoryMap::from_pairs(pairs))
}

/// Inner join of `rows` against `map` on the attribute name.
///
/// Rows without a category are dropped; an attribute with several categories
/// yields one output row per category.
pub fn attach_categories(rows: &[AttributeRow], map: &CategoryMap) -> Vec<CategorizedRow> {
    let categorized: Vec<CategorizedRow> = rows
        .iter()
        .flat_map(|row| {
            map.categories(&row.attribute_name).iter().map(move |category| CategorizedRow {
                attribute_name: row.attribute_name.clone(),
                category: category.clone(),
                persona_proportion: row.persona_proportion,
                base_proportion: row.base_proportion,
                index: row_index(row.persona_proportion, row.base_proportion),
            })
        })
        .collect();

    debug!(
        input_rows = rows.len(),
        categorized_rows = categorized.len(),
        "attached categories"
    );
    categorized
}

/// Writes categorized rows as CSV.
pub fn write_categorized_csv<W: Write>(rows: &[CategorizedRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record([
            "Attribute Name",
            "Category",
            "Persona Attribute Proportion",
            "Base Adjusted Population Attribute Proportion",
            "Index",
        ])?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
