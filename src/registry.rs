//! # Dimension Registry
//!
//! The fixed list of demographic dimensions, in report order:
//!
//! | Dimension           | Trigger                                  | Buckets                              |
//! |---------------------|------------------------------------------|--------------------------------------|
//! | Age                 | `Individuals of Age -`                   | six right-open ranges, 18 to 99      |
//! | Household Size      | `Household Size -`                       | One..Four persons, `Five+ persons`   |
//! | Household Income    | `Income Tiers=`                          | six tiers by parsed lower bound      |
//! | Ethnicity           | `Ethnic* Groups -`                       | five groups, `Other` fallback        |
//! | Gender              | `Gender -` (any case), not `Children`    | full attribute name or Male/Female/Both |
//! | Generation          | `Individual Generation -` (any case)     | Gen X, Gen Z, Baby Boomer, Millennials |
//! | Has Kids            | `Presence of Children -`, not `Modeled Rank` | text after the dash               |
//! | Urbanicity          | `Census: Rural-Urban County Size Code -` (any case) | text after the dash       |
//! | Household Education | `Household Education -`                  | five canonical levels                |
//!
//! Lookup tables are built once per registry and owned by its rules.

use std::collections::BTreeMap;
use std::thread;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::aggregate::{DimensionResult, aggregate};
use crate::rules::{AgeBin, BucketRule, Fallback, GroupKey, IncomeTier, Normalizer};
use crate::source::AttributeRow;

pub const AGE: &str = "Age";
pub const HOUSEHOLD_SIZE: &str = "Household Size";
pub const HOUSEHOLD_INCOME: &str = "Household Income";
pub const ETHNICITY: &str = "Ethnicity";
pub const GENDER: &str = "Gender";
pub const GENERATION: &str = "Generation";
pub const HAS_KIDS: &str = "Has Kids";
pub const URBANICITY: &str = "Urbanicity";
pub const HOUSEHOLD_EDUCATION: &str = "Household Education";

/// Bucket for education levels outside the canonical five, when surfaced
pub const UNMAPPED_BUCKET: &str = "Unmapped";

const AGE_BINS: &[AgeBin] = &[
    AgeBin { lower: 18, upper: 25, label: "18-24" },
    AgeBin { lower: 25, upper: 35, label: "25-34" },
    AgeBin { lower: 35, upper: 45, label: "35-44" },
    AgeBin { lower: 45, upper: 55, label: "45-54" },
    AgeBin { lower: 55, upper: 65, label: "55-64" },
    AgeBin { lower: 65, upper: 100, label: "65+" },
];

const HOUSEHOLD_SIZES: &[&str] = &["One person", "Two persons", "Three persons", "Four persons"];
const HOUSEHOLD_SIZE_FALLBACK: &str = "Five+ persons";

const INCOME_TIERS: &[IncomeTier] = &[
    IncomeTier { below: Some(50_000), label: "0–$49,999" },
    IncomeTier { below: Some(100_000), label: "$50,000–$99,999" },
    IncomeTier { below: Some(150_000), label: "$100,000–$149,999" },
    IncomeTier { below: Some(200_000), label: "$150,000–$199,999" },
    IncomeTier { below: Some(250_000), label: "$200,000–$249,999" },
    IncomeTier { below: None, label: "$250,000+" },
];

const ETHNICITY_BUCKETS: &[&str] = &["African American", "White/European", "Asian", "Hispanic", "Other"];
const ETHNICITY_FALLBACK: &str = "Other";

const ETHNICITY_SUBGROUPS: &[(&str, &str)] = &[
    ("African American", "African American"),
    ("Eastern European", "White/European"),
    ("Jewish", "White/European"),
    ("Western European", "White/European"),
    ("Scandinavian", "White/European"),
    ("Middle Eastern", "White/European"),
    ("Mediterranean", "White/European"),
    ("Polynesian", "Asian"),
    ("Central and Southwest Asia", "Asian"),
    ("Southeast Asia", "Asian"),
    ("Far Eastern", "Asian"),
    ("Hispanic", "Hispanic"),
    ("Uncoded", "Other"),
    ("Other Groups", "Other"),
    ("Native American", "Other"),
];

const EDUCATION_LEVELS: &[&str] = &[
    "Some high school or less",
    "High school",
    "Some college",
    "College",
    "Graduate school",
];

lazy_static! {
    static ref AGE_RE: Regex = Regex::new(r"Individuals of Age - (\d+)").unwrap();
    static ref ETHNICITY_RE: Regex = Regex::new(r"Ethnic\w*\s+Groups\s*-\s*(.+)$").unwrap();
    static ref GENDER_TRIGGER_RE: Regex = Regex::new(r"(?i)\bGender\s*-\s*").unwrap();
    static ref CHILDREN_RE: Regex = Regex::new(r"(?i)\bChildren\b").unwrap();
    static ref GENDER_LABEL_RE: Regex = Regex::new(r"Gender\s*-\s*(Male|Female|Both)").unwrap();
    static ref GENERATION_TRIGGER_RE: Regex = Regex::new(r"(?i)\bIndividual\s+Generation\s*-\s*").unwrap();
    static ref GENERATION_LABEL_RE: Regex =
        Regex::new(r"Individual\s+Generation\s*-\s*(Gen X|Gen Z|Baby Boomer|Millennials)").unwrap();
    static ref URBANICITY_TRIGGER_RE: Regex = Regex::new(r"(?i)Census:\s*Rural-Urban County Size Code\s*-").unwrap();
    static ref URBANICITY_LABEL_RE: Regex = Regex::new(r"Census:\s*Rural-Urban County Size Code\s*-\s*(.*)$").unwrap();
}

/// How gender rows are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenderGrouping {
    /// One bucket per distinct full attribute name (the established report output)
    #[default]
    AttributeName,
    /// Canonical Male / Female / Both buckets
    Label,
}

/// What happens to education levels outside the canonical five
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedPolicy {
    /// Leave them out of the dimension (the established report output)
    #[default]
    Drop,
    /// Collect them in an explicit `Unmapped` bucket
    Bucket,
}

/// Choices that change output cardinality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    pub gender_grouping: GenderGrouping,
    pub unmapped_policy: UnmappedPolicy,
}

/// Text following the first occurrence of `marker`, trimmed; `None` if absent or blank
fn text_after(name: &str, marker: &str) -> Option<String> {
    let (_, rest) = name.split_once(marker)?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

fn first_capture(re: &Regex, name: &str) -> Option<String> {
    re.captures(name)
        .and_then(|captures| captures.get(1))
        .map(|label| label.as_str().trim().to_string())
}

fn is_age(name: &str) -> bool {
    name.contains("Individuals of Age -")
}

fn extract_age(name: &str) -> Option<String> {
    first_capture(&AGE_RE, name)
}

fn is_household_size(name: &str) -> bool {
    name.contains("Household Size -")
}

fn extract_household_size(name: &str) -> Option<String> {
    text_after(name, "Household Size -")
}

fn is_household_income(name: &str) -> bool {
    name.contains("Income Tiers=")
}

fn extract_household_income(name: &str) -> Option<String> {
    text_after(name, "Income Tiers=")
}

fn is_ethnicity(name: &str) -> bool {
    ETHNICITY_RE.is_match(name)
}

fn extract_ethnicity(name: &str) -> Option<String> {
    first_capture(&ETHNICITY_RE, name)
}

fn is_gender(name: &str) -> bool {
    GENDER_TRIGGER_RE.is_match(name) && !CHILDREN_RE.is_match(name)
}

fn extract_gender(name: &str) -> Option<String> {
    first_capture(&GENDER_LABEL_RE, name)
}

fn is_generation(name: &str) -> bool {
    GENERATION_TRIGGER_RE.is_match(name)
}

fn extract_generation(name: &str) -> Option<String> {
    first_capture(&GENERATION_LABEL_RE, name)
}

fn is_has_kids(name: &str) -> bool {
    name.contains("Presence of Children -") && !name.contains("Modeled Rank")
}

fn extract_has_kids(name: &str) -> Option<String> {
    text_after(name, "Presence of Children -")
}

fn is_urbanicity(name: &str) -> bool {
    URBANICITY_TRIGGER_RE.is_match(name)
}

fn extract_urbanicity(name: &str) -> Option<String> {
    first_capture(&URBANICITY_LABEL_RE, name)
}

fn is_household_education(name: &str) -> bool {
    name.contains("Household Education -")
}

fn extract_household_education(name: &str) -> Option<String> {
    text_after(name, "Household Education -")
}

/// The nine dimension rules, in report order.
#[derive(Debug, Clone)]
pub struct DimensionRegistry {
    rules: Vec<BucketRule>,
}

impl Default for DimensionRegistry {
    fn default() -> Self {
        Self::new(&RegistryOptions::default())
    }
}

impl DimensionRegistry {
    pub fn new(options: &RegistryOptions) -> Self {
        let ethnicity_table: BTreeMap<&'static str, &'static str> = ETHNICITY_SUBGROUPS.iter().copied().collect();
        let education_table: BTreeMap<&'static str, &'static str> =
            EDUCATION_LEVELS.iter().map(|level| (*level, *level)).collect();

        let education_fallback = match options.unmapped_policy {
            UnmappedPolicy::Drop => Fallback::Drop,
            UnmappedPolicy::Bucket => Fallback::Bucket(UNMAPPED_BUCKET),
        };

        let gender_key = match options.gender_grouping {
            GenderGrouping::AttributeName => GroupKey::AttributeName,
            GenderGrouping::Label => GroupKey::Label,
        };

        let rules = vec![
            BucketRule {
                dimension_name: AGE,
                matcher: is_age,
                extractor: extract_age,
                normalizer: Normalizer::AgeBins(AGE_BINS),
                group_key: GroupKey::Label,
                bucket_order: Some(AGE_BINS.iter().map(|bin| bin.label).collect()),
            },
            BucketRule {
                dimension_name: HOUSEHOLD_SIZE,
                matcher: is_household_size,
                extractor: extract_household_size,
                normalizer: Normalizer::Contains {
                    needles: HOUSEHOLD_SIZES,
                    fallback: HOUSEHOLD_SIZE_FALLBACK,
                },
                group_key: GroupKey::Label,
                bucket_order: None,
            },
            BucketRule {
                dimension_name: HOUSEHOLD_INCOME,
                matcher: is_household_income,
                extractor: extract_household_income,
                normalizer: Normalizer::IncomeTiers(INCOME_TIERS),
                group_key: GroupKey::Label,
                bucket_order: Some(INCOME_TIERS.iter().map(|tier| tier.label).collect()),
            },
            BucketRule {
                dimension_name: ETHNICITY,
                matcher: is_ethnicity,
                extractor: extract_ethnicity,
                normalizer: Normalizer::Lookup {
                    table: ethnicity_table,
                    fallback: Fallback::Bucket(ETHNICITY_FALLBACK),
                },
                group_key: GroupKey::Label,
                bucket_order: Some(ETHNICITY_BUCKETS.to_vec()),
            },
            BucketRule {
                dimension_name: GENDER,
                matcher: is_gender,
                extractor: extract_gender,
                normalizer: Normalizer::Direct,
                group_key: gender_key,
                bucket_order: None,
            },
            BucketRule {
                dimension_name: GENERATION,
                matcher: is_generation,
                extractor: extract_generation,
                normalizer: Normalizer::Direct,
                group_key: GroupKey::Label,
                bucket_order: None,
            },
            BucketRule {
                dimension_name: HAS_KIDS,
                matcher: is_has_kids,
                extractor: extract_has_kids,
                normalizer: Normalizer::Direct,
                group_key: GroupKey::Label,
                bucket_order: None,
            },
            BucketRule {
                dimension_name: URBANICITY,
                matcher: is_urbanicity,
                extractor: extract_urbanicity,
                normalizer: Normalizer::Direct,
                group_key: GroupKey::Label,
                bucket_order: None,
            },
            BucketRule {
                dimension_name: HOUSEHOLD_EDUCATION,
                matcher: is_household_education,
                extractor: extract_household_education,
                normalizer: Normalizer::Lookup {
                    table: education_table,
                    fallback: education_fallback,
                },
                group_key: GroupKey::Label,
                bucket_order: None,
            },
        ];

        Self { rules }
    }

    pub fn rules(&self) -> &[BucketRule] {
        &self.rules
    }

    pub fn rule(&self, dimension_name: &str) -> Option<&BucketRule> {
        self.rules.iter().find(|rule| rule.dimension_name == dimension_name)
    }

    /// Evaluates every dimension in registry order on the calling thread.
    pub fn run(&self, rows: &[AttributeRow]) -> Vec<DimensionResult> {
        let results: Vec<DimensionResult> = self.rules.iter().map(|rule| run_rule(rule, rows)).collect();
        log_results(&results);
        results
    }

    /// Evaluates every dimension on its own scoped thread over the same rows.
    ///
    /// Results come back in registry order, identical to [`DimensionRegistry::run`].
    pub fn run_parallel(&self, rows: &[AttributeRow]) -> Vec<DimensionResult> {
        info!(dimensions = self.rules.len(), "evaluating dimensions on worker threads");

        let results: Vec<DimensionResult> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .rules
                .iter()
                .map(|rule| scope.spawn(move || run_rule(rule, rows)))
                .collect();

            // Joining in spawn order keeps registry order
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
                .collect()
        });

        log_results(&results);
        results
    }
}

/// Evaluates and aggregates a single rule.
pub fn run_rule(rule: &BucketRule, rows: &[AttributeRow]) -> DimensionResult {
    let bucketed = rule.evaluate(rows);
    aggregate(rule.dimension_name, &bucketed, rule.bucket_order.as_deref())
}

fn log_results(results: &[DimensionResult]) {
    for result in results {
        info!(dimension = %result.dimension_name, buckets = result.rows.len(), "aggregated dimension");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bucket_of(dimension: &str, name: &str) -> Option<String> {
        DimensionRegistry::default().rule(dimension).unwrap().bucket(name)
    }

    #[test]
    fn registry_order() {
        let registry = DimensionRegistry::default();
        let names: Vec<_> = registry.rules().iter().map(|rule| rule.dimension_name).collect();
        assert_eq!(
            names,
            vec![
                AGE,
                HOUSEHOLD_SIZE,
                HOUSEHOLD_INCOME,
                ETHNICITY,
                GENDER,
                GENERATION,
                HAS_KIDS,
                URBANICITY,
                HOUSEHOLD_EDUCATION
            ]
        );
    }

    #[test]
    fn age_boundaries() {
        assert_eq!(bucket_of(AGE, "Individuals of Age - 24").as_deref(), Some("18-24"));
        assert_eq!(bucket_of(AGE, "Individuals of Age - 25").as_deref(), Some("25-34"));
        assert_eq!(bucket_of(AGE, "Individuals of Age - 99").as_deref(), Some("65+"));
        assert_eq!(bucket_of(AGE, "Individuals of Age - 17"), None);
        assert_eq!(bucket_of(AGE, "Individuals of Age - 100"), None);
        assert_eq!(bucket_of(AGE, "Individuals of Age - unknown"), None);
    }

    #[test]
    fn household_size_collapses_large_households() {
        assert_eq!(bucket_of(HOUSEHOLD_SIZE, "Household Size - One person").as_deref(), Some("One person"));
        assert_eq!(bucket_of(HOUSEHOLD_SIZE, "Household Size - Four persons").as_deref(), Some("Four persons"));
        assert_eq!(bucket_of(HOUSEHOLD_SIZE, "Household Size - Five persons").as_deref(), Some("Five+ persons"));
        assert_eq!(
            bucket_of(HOUSEHOLD_SIZE, "Household Size - Nine or more persons").as_deref(),
            Some("Five+ persons")
        );
    }

    #[test]
    fn household_income_tiers() {
        assert_eq!(
            bucket_of(HOUSEHOLD_INCOME, "Income Tiers=$50,000 - $74,999").as_deref(),
            Some("$50,000–$99,999")
        );
        assert_eq!(bucket_of(HOUSEHOLD_INCOME, "Income Tiers=$250,000 or more").as_deref(), Some("$250,000+"));
        assert_eq!(bucket_of(HOUSEHOLD_INCOME, "Income Tiers=$0 - $14,999").as_deref(), Some("0–$49,999"));
        assert_eq!(
            bucket_of(HOUSEHOLD_INCOME, "Income Tiers=$200,000 - $249,999").as_deref(),
            Some("$200,000–$249,999")
        );
        assert_eq!(bucket_of(HOUSEHOLD_INCOME, "Income Tiers=$300,000 - $399,999").as_deref(), Some("$250,000+"));
        assert_eq!(bucket_of(HOUSEHOLD_INCOME, "Income Tiers - $50,000 - $74,999"), None);
    }

    #[test]
    fn ethnicity_subgroups() {
        assert_eq!(bucket_of(ETHNICITY, "Ethnicity Groups - Jewish").as_deref(), Some("White/European"));
        assert_eq!(bucket_of(ETHNICITY, "Ethnicity Groups - Polynesian").as_deref(), Some("Asian"));
        assert_eq!(bucket_of(ETHNICITY, "Ethnicity Groups - Martian").as_deref(), Some("Other"));
        assert_eq!(bucket_of(ETHNICITY, "Ethnic Groups - Hispanic").as_deref(), Some("Hispanic"));
        assert_eq!(bucket_of(ETHNICITY, "Ethnicity Groups - Native American").as_deref(), Some("Other"));
    }

    #[test]
    fn gender_excludes_children() {
        assert_eq!(bucket_of(GENDER, "Gender - Male").as_deref(), Some("Gender - Male"));
        assert_eq!(bucket_of(GENDER, "Children: Gender - Male"), None);
        assert_eq!(bucket_of(GENDER, "CHILDREN: gender - Female"), None);
        assert_eq!(bucket_of(GENDER, "Gender - Unknown").as_deref(), Some("Gender - Unknown"));
    }

    #[test]
    fn label_less_gender_rows_depend_on_grouping() {
        let rows = vec![
            AttributeRow::new("Gender - Male", 0.4, 0.5),
            AttributeRow::new("Gender - Unknown", 0.1, 0.05),
        ];
        let by_label = DimensionRegistry::new(&RegistryOptions {
            gender_grouping: GenderGrouping::Label,
            ..RegistryOptions::default()
        });

        let phrased = run_rule(DimensionRegistry::default().rule(GENDER).unwrap(), &rows);
        let unknown = phrased.bucket("Gender - Unknown").unwrap();
        assert!((unknown.index.unwrap() - 200.0).abs() < 1e-9);

        let canonical = run_rule(by_label.rule(GENDER).unwrap(), &rows);
        let labels: Vec<_> = canonical.rows.iter().map(|row| row.bucket_label.as_str()).collect();
        assert_eq!(labels, vec!["Male"]);
    }

    #[test]
    fn generation_labels() {
        assert_eq!(bucket_of(GENERATION, "Individual Generation - Gen X").as_deref(), Some("Gen X"));
        assert_eq!(bucket_of(GENERATION, "individual generation - Millennials").as_deref(), None);
        assert_eq!(
            bucket_of(GENERATION, "Individual Generation - Baby Boomer").as_deref(),
            Some("Baby Boomer")
        );
        assert_eq!(bucket_of(GENERATION, "Individual Generation - Silent"), None);
    }

    #[test]
    fn has_kids_excludes_modeled_rank() {
        assert_eq!(bucket_of(HAS_KIDS, "Presence of Children - Yes").as_deref(), Some("Yes"));
        assert_eq!(bucket_of(HAS_KIDS, "Presence of Children - Modeled Rank 3"), None);
    }

    #[test]
    fn urbanicity_label_capture_is_case_sensitive() {
        assert_eq!(
            bucket_of(URBANICITY, "Census: Rural-Urban County Size Code - Metro ").as_deref(),
            Some("Metro")
        );

        let registry = DimensionRegistry::default();
        let rule = registry.rule(URBANICITY).unwrap();
        let lowercase = "census: rural-urban county size code - Rural";
        assert!((rule.matcher)(lowercase));
        assert_eq!(rule.bucket(lowercase), None);
    }

    #[test]
    fn household_education_unmapped_policies() {
        let dropping = DimensionRegistry::default();
        let surfacing = DimensionRegistry::new(&RegistryOptions {
            unmapped_policy: UnmappedPolicy::Bucket,
            ..RegistryOptions::default()
        });

        let known = "Household Education - College";
        let unknown = "Household Education - Trade school";
        let rule = |registry: &DimensionRegistry, name: &str| {
            registry.rule(HOUSEHOLD_EDUCATION).unwrap().bucket(name)
        };

        assert_eq!(rule(&dropping, known).as_deref(), Some("College"));
        assert_eq!(rule(&dropping, unknown), None);
        assert_eq!(rule(&surfacing, unknown).as_deref(), Some(UNMAPPED_BUCKET));
    }

    #[test]
    fn parallel_matches_sequential() {
        let rows = vec![
            AttributeRow::new("Individuals of Age - 30", 0.05, 0.04),
            AttributeRow::new("Gender - Female", 0.6, 0.5),
            AttributeRow::new("Ethnicity Groups - Hispanic", 0.1, 0.2),
            AttributeRow::new("Household Size - Two persons", 0.3, 0.25),
        ];
        let registry = DimensionRegistry::default();
        assert_eq!(registry.run(&rows), registry.run_parallel(&rows));
    }

    fn gender_rows() -> Vec<AttributeRow> {
        vec![
            AttributeRow::new("Gender - Male", 0.2, 0.25),
            AttributeRow::new("Individual Gender - Male", 0.1, 0.25),
            AttributeRow::new("Gender - Female", 0.7, 0.5),
        ]
    }

    #[test]
    fn gender_grouped_by_attribute_name() {
        let registry = DimensionRegistry::default();
        let result = run_rule(registry.rule(GENDER).unwrap(), &gender_rows());
        let labels: Vec<_> = result.rows.iter().map(|row| row.bucket_label.as_str()).collect();
        assert_eq!(labels, vec!["Gender - Female", "Gender - Male", "Individual Gender - Male"]);
    }

    #[test]
    fn gender_grouped_by_label() {
        let registry = DimensionRegistry::new(&RegistryOptions {
            gender_grouping: GenderGrouping::Label,
            ..RegistryOptions::default()
        });
        let result = run_rule(registry.rule(GENDER).unwrap(), &gender_rows());
        let labels: Vec<_> = result.rows.iter().map(|row| row.bucket_label.as_str()).collect();
        assert_eq!(labels, vec!["Female", "Male"]);
        let male = result.bucket("Male").unwrap();
        assert!((male.persona_sum - 0.3).abs() < 1e-12);
        assert!((male.base_sum - 0.5).abs() < 1e-12);
    }

    /// Attribute names and the one dimension that buckets each, if any
    const ROW_POOL: &[(&str, Option<&str>)] = &[
        ("Individuals of Age - 30", Some(AGE)),
        ("Household Size - Two persons", Some(HOUSEHOLD_SIZE)),
        ("Income Tiers=$50,000 - $74,999", Some(HOUSEHOLD_INCOME)),
        ("Ethnicity Groups - Jewish", Some(ETHNICITY)),
        ("Gender - Female", Some(GENDER)),
        ("Individual Generation - Gen Z", Some(GENERATION)),
        ("Presence of Children - Yes", Some(HAS_KIDS)),
        ("Census: Rural-Urban County Size Code - Metro", Some(URBANICITY)),
        ("Household Education - College", Some(HOUSEHOLD_EDUCATION)),
        ("Children: Gender - Male", None),
        ("Children's Gender - Female", None),
        ("Presence of Children - Modeled Rank 2", None),
        ("Income Tiers - $50,000 - $74,999", None),
        ("Individuals of Age 30", None),
        ("Household Size 3", None),
        ("Education - College", None),
        ("Generation - Gen X", None),
        ("individual generation - gen x", None),
        ("Ethnicity - Jewish", None),
        ("Census: Urban", None),
        ("Interest - Golf", None),
        ("", None),
    ];

    proptest! {
        #[test]
        fn rows_reach_only_their_own_dimension(
            picks in prop::collection::vec(prop::sample::select(ROW_POOL.to_vec()), 0..30)
        ) {
            let rows: Vec<AttributeRow> = picks.iter().map(|(name, _)| AttributeRow::new(*name, 1.0, 1.0)).collect();

            for result in DimensionRegistry::default().run(&rows) {
                let owned = picks
                    .iter()
                    .filter(|(_, owner)| *owner == Some(result.dimension_name.as_str()))
                    .count();
                let bucketed: f64 = result.rows.iter().map(|row| row.persona_sum).sum();
                prop_assert_eq!(bucketed, owned as f64, "{} bucketed foreign rows", result.dimension_name);
            }
        }

        #[test]
        fn gender_buckets_per_grouping(
            labels in prop::collection::vec(prop::sample::select(vec!["Male", "Female", "Both"]), 1..12),
            prefixes in prop::collection::vec(prop::sample::select(vec!["", "Individual ", "Head of Household "]), 12)
        ) {
            let rows: Vec<AttributeRow> = labels
                .iter()
                .zip(&prefixes)
                .map(|(label, prefix)| AttributeRow::new(format!("{}Gender - {}", prefix, label), 0.1, 0.1))
                .collect();

            let by_label = DimensionRegistry::new(&RegistryOptions {
                gender_grouping: GenderGrouping::Label,
                ..RegistryOptions::default()
            });
            let by_name = DimensionRegistry::default();

            let canonical = run_rule(by_label.rule(GENDER).unwrap(), &rows);
            let phrased = run_rule(by_name.rule(GENDER).unwrap(), &rows);

            let mut distinct_labels: Vec<&str> = labels.iter().copied().collect();
            distinct_labels.sort();
            distinct_labels.dedup();
            let mut distinct_names: Vec<&str> = rows.iter().map(|row| row.attribute_name.as_str()).collect();
            distinct_names.sort();
            distinct_names.dedup();

            prop_assert_eq!(canonical.rows.len(), distinct_labels.len());
            prop_assert_eq!(phrased.rows.len(), distinct_names.len());
            for row in &canonical.rows {
                prop_assert!(["Male", "Female", "Both"].contains(&row.bucket_label.as_str()));
            }
        }
    }
}
