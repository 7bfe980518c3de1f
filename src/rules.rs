//! # Bucket Rules
//!
//! A bucket rule turns free-text attribute names into coarse bucket labels for
//! one demographic dimension. Evaluation runs four steps per row:
//!
//! 1. **Match** - the rule's matcher accepts the attribute name (this is also
//!    where overlap exclusions such as "Children" under gender live)
//! 2. **Extract** - the extractor pulls the raw category text out of the name
//! 3. **Normalize** - the normalizer maps raw text onto the final bucket set
//! 4. **Group key** - the bucket label, or the full attribute name for rules
//!    that group by the original phrasing
//!
//! A row failing any step is dropped from that dimension only. Rules grouping
//! by attribute name keep every matched row, labelled or not. Rules are
//! built once by the registry and never mutated afterwards.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::source::AttributeRow;

/// Predicate over attribute names
pub type Matcher = fn(&str) -> bool;

/// Pulls the raw category text out of a matched attribute name
pub type Extractor = fn(&str) -> Option<String>;

/// Right-open age range `[lower, upper)` and its bucket label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBin {
    pub lower: u32,
    pub upper: u32,
    pub label: &'static str,
}

/// Income tier holding every lower bound below `below`; `None` is the open top tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeTier {
    pub below: Option<u64>,
    pub label: &'static str,
}

/// What happens to raw text a lookup table does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Send it to this bucket
    Bucket(&'static str),
    /// Drop the row from the dimension
    Drop,
}

/// Maps extracted text onto a dimension's bucket set.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalizer {
    /// The extracted text is the bucket
    Direct,
    /// Extracted text is an integer age, binned into right-open ranges
    AgeBins(&'static [AgeBin]),
    /// First needle contained in the text is the bucket, otherwise the fallback
    Contains {
        needles: &'static [&'static str],
        fallback: &'static str,
    },
    /// Exact-key dictionary lookup
    Lookup {
        table: BTreeMap<&'static str, &'static str>,
        fallback: Fallback,
    },
    /// Currency range text, bucketed by its parsed lower bound
    IncomeTiers(&'static [IncomeTier]),
}

impl Normalizer {
    /// Returns the bucket for `raw`, or `None` when the row must be dropped.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        match self {
            Normalizer::Direct => Some(raw.to_string()),
            Normalizer::AgeBins(bins) => {
                let age: u32 = raw.trim().parse().ok()?;
                bins.iter()
                    .find(|bin| age >= bin.lower && age < bin.upper)
                    .map(|bin| bin.label.to_string())
            }
            Normalizer::Contains { needles, fallback } => Some(
                needles
                    .iter()
                    .find(|needle| raw.contains(*needle))
                    .copied()
                    .unwrap_or(*fallback)
                    .to_string(),
            ),
            Normalizer::Lookup { table, fallback } => match table.get(raw) {
                Some(bucket) => Some(bucket.to_string()),
                None => match fallback {
                    Fallback::Bucket(bucket) => Some(bucket.to_string()),
                    Fallback::Drop => None,
                },
            },
            Normalizer::IncomeTiers(tiers) => {
                let lower = income_lower_bound(raw)?;
                tiers
                    .iter()
                    .find(|tier| tier.below.is_none_or(|below| lower < below))
                    .map(|tier| tier.label.to_string())
            }
        }
    }
}

/// Lower bound implied by an "or more" income tier
pub const OPEN_INCOME_LOWER_BOUND: u64 = 250_000;

/// Parses the lower bound of an income range.
///
/// `"$50,000 - $74,999"` gives 50000, `"$250,000 or more"` gives 250000, and
/// text with neither a range nor "or more" counts as 0. A range whose lower
/// side is not a number yields `None`.
pub fn income_lower_bound(text: &str) -> Option<u64> {
    let cleaned = text.replace(['$', ','], "").to_lowercase();

    if cleaned.contains("or more") {
        return Some(OPEN_INCOME_LOWER_BOUND);
    }

    match cleaned.split_once('-') {
        Some((lower, _)) => lower.trim().parse().ok(),
        None => Some(0),
    }
}

/// Which value rows are grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// The normalized bucket label
    Label,
    /// The complete original attribute name
    AttributeName,
}

/// One dimension's matching, labelling, and ordering rule.
#[derive(Debug, Clone)]
pub struct BucketRule {
    pub dimension_name: &'static str,
    pub matcher: Matcher,
    pub extractor: Extractor,
    pub normalizer: Normalizer,
    pub group_key: GroupKey,
    /// Fixed presentation order; `None` means lexical order
    pub bucket_order: Option<Vec<&'static str>>,
}

/// A source row that a rule accepted, with the label it groups under
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedRow<'a> {
    pub row: &'a AttributeRow,
    pub bucket_label: String,
}

impl BucketRule {
    /// Runs match, extract, and normalize for one row.
    ///
    /// Returns the group label, or `None` if the row does not belong to this
    /// dimension or carries no usable label.
    pub fn bucket(&self, attribute_name: &str) -> Option<String> {
        if !(self.matcher)(attribute_name) {
            return None;
        }
        if self.group_key == GroupKey::AttributeName {
            return Some(attribute_name.to_string());
        }

        let raw = (self.extractor)(attribute_name)?;
        let label = self.normalizer.normalize(&raw)?;
        (!label.is_empty()).then_some(label)
    }

    /// Buckets every row of the source that belongs to this dimension.
    pub fn evaluate<'a>(&self, rows: &'a [AttributeRow]) -> Vec<BucketedRow<'a>> {
        let mut matched = 0usize;
        let mut bucketed = Vec::new();

        for row in rows {
            if !(self.matcher)(&row.attribute_name) {
                continue;
            }
            matched += 1;

            match self.bucket(&row.attribute_name) {
                Some(bucket_label) => bucketed.push(BucketedRow { row, bucket_label }),
                None => trace!(
                    dimension = self.dimension_name,
                    attribute = %row.attribute_name,
                    "matched row has no usable label, skipping"
                ),
            }
        }

        debug!(
            dimension = self.dimension_name,
            matched,
            kept = bucketed.len(),
            dropped = matched - bucketed.len(),
            "evaluated bucket rule"
        );

        bucketed
    }
}
