mod config;
mod error;
mod model;
mod source;
mod stream;
mod util;
mod progress;

mod tags;
mod normalize;
mod shape;
mod schema;
mod sinks;
mod pipeline;

mod audit;
mod sample;

pub use crate::config::{CancellationToken, ETLOptions};
pub use crate::error::{EtlError, FieldError, NormalizationError, RelationErrors, ValidationError};
pub use crate::pipeline::{DryRunReport, OsmETL, RunSummary};

// Typed elements and output rows.
pub use crate::model::{
    Attribution, ElementKind, Node, NodeRow, OsmElement, RawChild, RawElement, ShapedRecord, Tag, TagRow, Way,
    WayNodeRow, WayRow,
};

// Core primitives, for callers that drive the stages themselves.
pub use crate::normalize::{street_type, NormalizationRules, CITY_KEY, STREET_KEY};
pub use crate::schema::{validate, FieldSpec, FieldType, RelationSchema, Schema};
pub use crate::shape::{ShapeStats, Shaper, TagKind, UnknownValuePolicy};
pub use crate::sinks::{
    RelationWriters, RowCounts, NODES_FILE, NODE_TAGS_FILE, WAYS_FILE, WAY_NODES_FILE, WAY_TAGS_FILE,
};
pub use crate::source::open_document;
pub use crate::stream::ElementStream;
pub use crate::tags::{classify_key, has_problem_chars, split_key, KeyClass, DEFAULT_TAG_TYPE};

// Audits and sampling.
pub use crate::audit::{audit_street_types, count_elements, count_key_types, KeyTypeCounts};
pub use crate::sample::{write_element, write_sample};
