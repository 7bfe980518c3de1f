//! # Index Report Aggregator
//!
//! Rolls the fine-grained attribute rows of an Index Report export (persona
//! share versus population baseline share) up into coarse demographic buckets
//! and computes an index for each bucket:
//!
//! ```text
//! index = persona share / baseline share * 100
//! ```
//!
//! ## Pipeline
//!
//! 1. [`source`] loads the rows and checks the required columns exist
//! 2. [`registry`] holds one [`rules::BucketRule`] per demographic dimension
//! 3. [`aggregate`] groups each dimension's rows and computes the index
//! 4. [`merge`] concatenates all dimensions into one report of whole-number percentages
//!
//! [`category_map`] is a separate enrichment step joining rows to categories.
//!
//! ## Example
//!
//! ```rust
//! use index_report_aggregator::{merge, AttributeRow, DimensionRegistry};
//!
//! let rows = vec![
//!     AttributeRow::new("Individuals of Age - 30", 0.05, 0.04),
//!     AttributeRow::new("Individuals of Age - 40", 0.03, 0.03),
//! ];
//! let report = merge(&DimensionRegistry::default().run(&rows));
//!
//! assert_eq!(report.rows[0].bucket_label, "25-34");
//! assert_eq!(report.rows[0].index_pct, Some(125));
//! ```

pub mod aggregate;
pub mod category_map;
pub mod cli;
pub mod error;
pub mod merge;
pub mod registry;
pub mod rules;
pub mod source;

pub use aggregate::{DimensionResult, DimensionRow, aggregate, compute_index};
pub use error::{ReportError, Result};
pub use merge::{MergedReport, MergedRow, merge};
pub use registry::{DimensionRegistry, GenderGrouping, RegistryOptions, UnmappedPolicy};
pub use rules::{BucketRule, BucketedRow};
pub use source::{AttributeRow, SourceColumns, SourceOptions, load_rows, read_rows};
