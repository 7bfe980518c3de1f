//! # Aggregator
//!
//! Groups bucketed rows by label, sums both proportion columns, and computes
//! the index (persona share over baseline share, times 100).

use std::collections::BTreeMap;

use tracing::warn;

use crate::rules::BucketedRow;

/// One bucket of a dimension's result table
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow {
    pub bucket_label: String,
    pub persona_sum: f64,
    pub base_sum: f64,
    /// `None` when the baseline sum is zero and the index is undefined
    pub index: Option<f64>,
}

/// Aggregated buckets for one dimension, in presentation order
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionResult {
    pub dimension_name: String,
    pub rows: Vec<DimensionRow>,
}

impl DimensionResult {
    pub fn bucket(&self, label: &str) -> Option<&DimensionRow> {
        self.rows.iter().find(|row| row.bucket_label == label)
    }
}

/// Sum that skips NaN values; all-missing input sums to zero.
#[derive(Debug, Default, Clone, Copy)]
struct SkipNanSum(f64);

impl SkipNanSum {
    fn add(&mut self, value: f64) {
        if !value.is_nan() {
            self.0 += value;
        }
    }
}

/// Index of a persona share against a baseline share.
///
/// Returns `None` when `base` is zero: the index is undefined there and is
/// surfaced as such rather than as an infinity.
pub fn compute_index(persona: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        None
    } else {
        Some(persona / base * 100.0)
    }
}

/// Groups `bucketed` rows into one result table.
///
/// # Arguments
///
/// * `dimension_name` - Name the result is tagged with
/// * `bucketed` - Rows accepted by the dimension's rule
/// * `bucket_order` - Fixed presentation order; buckets without rows are omitted.
///   Without an order, buckets come out in lexical label order.
///
/// # Returns
///
/// * `DimensionResult` - One row per distinct label
pub fn aggregate(dimension_name: &str, bucketed: &[BucketedRow<'_>], bucket_order: Option<&[&str]>) -> DimensionResult {
    let mut sums: BTreeMap<&str, (SkipNanSum, SkipNanSum)> = BTreeMap::new();

    for entry in bucketed {
        let (persona, base) = sums.entry(entry.bucket_label.as_str()).or_default();
        persona.add(entry.row.persona_proportion);
        base.add(entry.row.base_proportion);
    }

    let mut labels: Vec<&str> = Vec::with_capacity(sums.len());
    match bucket_order {
        Some(order) => {
            labels.extend(order.iter().copied().filter(|label| sums.contains_key(label)));

            // Labels the order does not know go last, lexically
            for label in sums.keys() {
                if !order.contains(label) {
                    warn!(dimension = dimension_name, bucket = *label, "bucket missing from fixed order");
                    labels.push(*label);
                }
            }
        }
        None => labels.extend(sums.keys().copied()),
    }

    let rows = labels
        .into_iter()
        .map(|label| {
            let (persona, base) = sums[label];
            let index = compute_index(persona.0, base.0);
            if index.is_none() {
                warn!(dimension = dimension_name, bucket = label, "baseline sum is zero, index undefined");
            }
            DimensionRow {
                bucket_label: label.to_string(),
                persona_sum: persona.0,
                base_sum: base.0,
                index,
            }
        })
        .collect();

    DimensionResult {
        dimension_name: dimension_name.to_string(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::AttributeRow;
    use proptest::prelude::*;

    fn bucketed<'a>(rows: &'a [AttributeRow], labels: &[&str]) -> Vec<BucketedRow<'a>> {
        rows.iter()
            .zip(labels)
            .map(|(row, label)| BucketedRow { row, bucket_label: label.to_string() })
            .collect()
    }

    #[test]
    fn index_of_double_share_is_200() {
        let index = compute_index(0.20, 0.10).unwrap();
        assert!((index - 200.0).abs() < 1e-9);
    }

    #[test]
    fn zero_base_has_no_index() {
        assert_eq!(compute_index(0.2, 0.0), None);
        assert_eq!(compute_index(0.0, 0.0), None);
    }

    #[test]
    fn sums_per_label() {
        let rows = vec![
            AttributeRow::new("a", 0.1, 0.2),
            AttributeRow::new("b", 0.3, 0.3),
            AttributeRow::new("c", 0.1, 0.2),
        ];
        let result = aggregate("Dim", &bucketed(&rows, &["x", "y", "x"]), None);

        assert_eq!(result.dimension_name, "Dim");
        assert_eq!(result.rows.len(), 2);
        let x = result.bucket("x").unwrap();
        assert!((x.persona_sum - 0.2).abs() < 1e-12);
        assert!((x.base_sum - 0.4).abs() < 1e-12);
        assert!((x.index.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_values_are_skipped_not_zeroed() {
        let rows = vec![
            AttributeRow::new("a", f64::NAN, 0.2),
            AttributeRow::new("b", 0.3, f64::NAN),
        ];
        let result = aggregate("Dim", &bucketed(&rows, &["x", "x"]), None);
        let x = &result.rows[0];
        assert_eq!(x.persona_sum, 0.3);
        assert_eq!(x.base_sum, 0.2);
    }

    #[test]
    fn all_missing_sums_to_zero_with_undefined_index() {
        let rows = vec![AttributeRow::new("a", f64::NAN, f64::NAN)];
        let result = aggregate("Dim", &bucketed(&rows, &["x"]), None);
        assert_eq!(result.rows[0].persona_sum, 0.0);
        assert_eq!(result.rows[0].base_sum, 0.0);
        assert_eq!(result.rows[0].index, None);
    }

    #[test]
    fn fixed_order_is_followed_and_empty_buckets_omitted() {
        let rows = vec![
            AttributeRow::new("a", 0.1, 0.1),
            AttributeRow::new("b", 0.1, 0.1),
        ];
        let order = ["c", "b", "z", "a"];
        let result = aggregate("Dim", &bucketed(&rows, &["a", "b"]), Some(&order[..]));
        let labels: Vec<_> = result.rows.iter().map(|row| row.bucket_label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
    }

    #[test]
    fn unordered_labels_follow_fixed_ones() {
        let rows = vec![
            AttributeRow::new("a", 0.1, 0.1),
            AttributeRow::new("b", 0.1, 0.1),
            AttributeRow::new("c", 0.1, 0.1),
        ];
        let order = ["b"];
        let result = aggregate("Dim", &bucketed(&rows, &["q", "b", "p"]), Some(&order[..]));
        let labels: Vec<_> = result.rows.iter().map(|row| row.bucket_label.as_str()).collect();
        assert_eq!(labels, vec!["b", "p", "q"]);
    }

    #[test]
    fn default_order_is_lexical() {
        let rows = vec![
            AttributeRow::new("a", 0.1, 0.1),
            AttributeRow::new("b", 0.1, 0.1),
        ];
        let result = aggregate("Dim", &bucketed(&rows, &["Two persons", "Four persons"]), None);
        assert_eq!(result.rows[0].bucket_label, "Four persons");
        assert_eq!(result.rows[1].bucket_label, "Two persons");
    }

    proptest! {
        #[test]
        fn labels_unique_and_sums_match(
            entries in prop::collection::vec((0usize..4, prop::option::of(0.0f64..1.0), 0.0f64..1.0), 0..40)
        ) {
            let labels = ["a", "b", "c", "d"];
            let rows: Vec<AttributeRow> = entries
                .iter()
                .map(|(_, persona, base)| AttributeRow::new("row", persona.unwrap_or(f64::NAN), *base))
                .collect();
            let row_labels: Vec<&str> = entries.iter().map(|(label, _, _)| labels[*label]).collect();

            let result = aggregate("Dim", &bucketed(&rows, &row_labels), None);

            let mut seen: Vec<&str> = result.rows.iter().map(|row| row.bucket_label.as_str()).collect();
            let total = seen.len();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);

            let expected_persona: f64 = rows.iter().map(|row| row.persona_proportion).filter(|v| !v.is_nan()).sum();
            let actual_persona: f64 = result.rows.iter().map(|row| row.persona_sum).sum();
            prop_assert!((expected_persona - actual_persona).abs() < 1e-9);
        }
    }
}
