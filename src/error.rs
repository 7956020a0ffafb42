//! Typed errors for the extraction pipeline.
//!
//! Builder entry points return `anyhow::Result`; these types travel inside the
//! `anyhow` chain and can be recovered with `downcast_ref`.

use std::fmt;
use thiserror::Error;

/// Errors raised while reading, shaping, or writing OSM elements.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EtlError {
    /// A node or way lacks an attribute every output row depends on.
    #[error("{element} {id} is missing required attribute '{field}'")]
    MissingRequiredField {
        element: &'static str,
        /// Raw `id` attribute, or `"?"` when the id itself is absent.
        id: String,
        field: &'static str,
    },

    /// An attribute is present but cannot be parsed (e.g. a non-integer id).
    #[error("{element} {id}: attribute '{field}' has invalid value {value:?}")]
    InvalidAttribute {
        element: &'static str,
        id: String,
        field: &'static str,
        value: String,
    },

    /// The element kind has no relational shape (e.g. `relation`).
    #[error("element <{0}> cannot be shaped into output rows")]
    UnsupportedElement(String),

    #[error(transparent)]
    UnknownNormalizationValue(#[from] NormalizationError),

    /// Sampled records failed schema validation, so the full pass was not
    /// started. Carries every failing record, not just the first.
    #[error(
        "{} of {checked} sampled records failed schema validation; full run not started{}",
        .failures.len(),
        render_records(.failures)
    )]
    SchemaValidation { checked: u64, failures: Vec<ValidationError> },

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A value matched no normalization rule and no canonical allow-list entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no canonical {kind} for value {value:?}")]
pub struct NormalizationError {
    pub kind: &'static str,
    pub value: String,
}

/// One field-level schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path of the field within its relation, e.g. `lat` or `[2].key`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All field errors found in one relation of a shaped record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationErrors {
    pub relation: String,
    pub errors: Vec<FieldError>,
}

/// A shaped record does not conform to the declared schema.
///
/// Lists every failing relation and every field error within it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("element {element_id} failed schema validation{}", render_relations(.failures))]
pub struct ValidationError {
    pub element_id: i64,
    pub failures: Vec<RelationErrors>,
}

impl ValidationError {
    pub fn error_count(&self) -> usize {
        self.failures.iter().map(|f| f.errors.len()).sum()
    }

    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.relation.as_str())
    }
}

fn render_relations(failures: &[RelationErrors]) -> String {
    let mut out = String::new();
    for rel in failures {
        out.push_str(&format!("\n  relation '{}' has {} error(s):", rel.relation, rel.errors.len()));
        for e in &rel.errors {
            out.push_str(&format!("\n    {}", e));
        }
    }
    out
}

fn render_records(records: &[ValidationError]) -> String {
    records.iter().map(|r| format!("\n{}", r)).collect()
}
