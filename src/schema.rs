//! Declarative output schema and the validator that checks shaped records
//! against it.

use crate::error::{FieldError, RelationErrors, ValidationError};
use crate::model::ShapedRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const NODES: &str = "node";
pub const NODE_TAGS: &str = "node_tags";
pub const WAYS: &str = "way";
pub const WAY_NODES: &str = "way_nodes";
pub const WAY_TAGS: &str = "way_tags";

/// Column type. String-typed source values are accepted when they parse as the
/// declared type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    String,
    /// RFC 3339 timestamp string.
    Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// The field must be present. An empty string still counts as present.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Reject empty strings.
    #[serde(default)]
    pub non_empty: bool,
}

fn default_required() -> bool {
    true
}

/// Ordered field list of one output relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSchema {
    pub fields: Vec<FieldSpec>,
}

impl RelationSchema {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Schemas keyed by relation name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub relations: BTreeMap<String, RelationSchema>,
}

fn rel(fields: &[(&str, FieldType)]) -> RelationSchema {
    RelationSchema {
        fields: fields
            .iter()
            .map(|(name, t)| FieldSpec { name: name.to_string(), field_type: *t, required: true, non_empty: false })
            .collect(),
    }
}

impl Schema {
    /// The schema for the five OSM output relations.
    pub fn osm() -> Self {
        use FieldType::{Float, Integer, String as Str, Timestamp};
        let mut tags = rel(&[("id", Integer), ("key", Str), ("value", Str), ("type", Str)]);
        // OSM allows v="" but a tag without a key has no meaning.
        for f in tags.fields.iter_mut().filter(|f| f.name == "key") {
            f.non_empty = true;
        }
        let mut relations = BTreeMap::new();
        relations.insert(
            NODES.to_string(),
            rel(&[
                ("id", Integer), ("lat", Float), ("lon", Float), ("user", Str), ("uid", Integer),
                ("version", Str), ("changeset", Integer), ("timestamp", Timestamp),
            ]),
        );
        relations.insert(NODE_TAGS.to_string(), tags.clone());
        relations.insert(
            WAYS.to_string(),
            rel(&[
                ("id", Integer), ("user", Str), ("uid", Integer), ("version", Str),
                ("changeset", Integer), ("timestamp", Timestamp),
            ]),
        );
        relations.insert(
            WAY_NODES.to_string(),
            rel(&[("id", Integer), ("node_id", Integer), ("position", Integer)]),
        );
        relations.insert(WAY_TAGS.to_string(), tags);
        Self { relations }
    }

    pub fn from_json_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read schema {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse schema {}", path.display()))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::osm()
    }
}

/// Check every row of `record` against `schema`, collecting all field errors
/// across all relations before failing.
pub fn validate(record: &ShapedRecord, schema: &Schema) -> Result<(), ValidationError> {
    let mut failures = Vec::new();
    let mut check = |relation: &str, rows: Vec<Value>, is_list: bool| {
        let errors = check_rows(schema, relation, &rows, is_list);
        if !errors.is_empty() {
            failures.push(RelationErrors { relation: relation.to_string(), errors });
        }
    };

    match record {
        ShapedRecord::Node { node, tags } => {
            check(NODES, vec![to_value(node)], false);
            check(NODE_TAGS, tags.iter().map(to_value).collect(), true);
        }
        ShapedRecord::Way { way, nodes, tags } => {
            check(WAYS, vec![to_value(way)], false);
            check(WAY_NODES, nodes.iter().map(to_value).collect(), true);
            check(WAY_TAGS, tags.iter().map(to_value).collect(), true);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { element_id: record.id(), failures })
    }
}

fn to_value<T: Serialize>(row: &T) -> Value {
    // Row structs hold only strings and integers.
    serde_json::to_value(row).unwrap_or(Value::Null)
}

fn check_rows(schema: &Schema, relation: &str, rows: &[Value], is_list: bool) -> Vec<FieldError> {
    let Some(rel) = schema.relation(relation) else {
        return vec![FieldError { field: relation.to_string(), message: "relation not declared in schema".into() }];
    };
    let mut errors = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let prefix = if is_list { format!("[{}].", i) } else { String::new() };
        match row.as_object() {
            Some(map) => check_row(rel, map, &prefix, &mut errors),
            None => errors.push(FieldError { field: format!("{prefix}<row>"), message: "not a mapping".into() }),
        }
    }
    errors
}

fn check_row(rel: &RelationSchema, row: &Map<String, Value>, prefix: &str, errors: &mut Vec<FieldError>) {
    for spec in &rel.fields {
        let field = format!("{prefix}{}", spec.name);
        match row.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    errors.push(FieldError { field, message: "required field".into() });
                }
            }
            Some(Value::String(s)) if s.is_empty() && spec.non_empty => {
                errors.push(FieldError { field, message: "empty values not allowed".into() });
            }
            Some(v) => {
                if let Some(message) = type_error(spec.field_type, v) {
                    errors.push(FieldError { field, message });
                }
            }
        }
    }
    for name in row.keys() {
        if !rel.fields.iter().any(|f| &f.name == name) {
            errors.push(FieldError { field: format!("{prefix}{name}"), message: "unknown field".into() });
        }
    }
}

fn type_error(t: FieldType, v: &Value) -> Option<String> {
    let ok = match (t, v) {
        (FieldType::String, Value::String(_)) => true,
        (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
        (FieldType::Float, Value::Number(_)) => true,
        (FieldType::Float, Value::String(s)) => s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false),
        (FieldType::Timestamp, Value::String(s)) => OffsetDateTime::parse(s, &Rfc3339).is_ok(),
        _ => false,
    };
    if ok {
        None
    } else {
        let name = match t {
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Timestamp => "RFC 3339 timestamp",
        };
        Some(format!("must be of {name} type, got {v}"))
    }
}
