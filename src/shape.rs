//! Record shaper: one typed element in, flat relational rows out.

use crate::error::{EtlError, NormalizationError};
use crate::model::{Node, NodeRow, OsmElement, ShapedRecord, Tag, TagRow, Way, WayNodeRow, WayRow};
use crate::normalize::{NormalizationRules, CITY_KEY, STREET_KEY};
use crate::tags::{has_problem_chars, split_key};

/// What to do with a tag whose value has no canonical form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownValuePolicy {
    /// Emit the tag with its original value.
    #[default]
    PassThrough,
    /// Drop just that tag.
    DropTag,
    /// Abort with `UnknownNormalizationValue`.
    Fail,
}

/// Semantic role of a tag, decided by its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    Street,
    City,
    Other,
}

impl TagKind {
    pub fn of(key: &str) -> Self {
        match key {
            STREET_KEY => Self::Street,
            CITY_KEY => Self::City,
            _ => Self::Other,
        }
    }
}

/// Per-run tallies of record-local tag issues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShapeStats {
    pub malformed_keys: u64,
    pub unknown_values: u64,
}

impl ShapeStats {
    pub fn merge(&mut self, other: ShapeStats) {
        self.malformed_keys += other.malformed_keys;
        self.unknown_values += other.unknown_values;
    }
}

/// Stateless shaper bound to a rule set and an unknown-value policy.
#[derive(Clone, Copy, Debug)]
pub struct Shaper<'a> {
    rules: &'a NormalizationRules,
    policy: UnknownValuePolicy,
}

impl<'a> Shaper<'a> {
    pub fn new(rules: &'a NormalizationRules, policy: UnknownValuePolicy) -> Self {
        Self { rules, policy }
    }

    /// Shape one element, adding any dropped/unknown tag counts to `stats`.
    pub fn shape(&self, element: &OsmElement, stats: &mut ShapeStats) -> Result<ShapedRecord, EtlError> {
        match element {
            OsmElement::Node(n) => self.shape_node(n, stats),
            OsmElement::Way(w) => self.shape_way(w, stats),
        }
    }

    fn shape_node(&self, n: &Node, stats: &mut ShapeStats) -> Result<ShapedRecord, EtlError> {
        let node = NodeRow {
            id: n.id,
            lat: n.lat.clone(),
            lon: n.lon.clone(),
            user: n.meta.user.clone(),
            uid: n.meta.uid.clone(),
            version: n.meta.version.clone(),
            changeset: n.meta.changeset.clone(),
            timestamp: n.meta.timestamp.clone(),
        };
        let tags = self.shape_tags(n.id, &n.tags, stats)?;
        Ok(ShapedRecord::Node { node, tags })
    }

    fn shape_way(&self, w: &Way, stats: &mut ShapeStats) -> Result<ShapedRecord, EtlError> {
        let way = WayRow {
            id: w.id,
            user: w.meta.user.clone(),
            uid: w.meta.uid.clone(),
            version: w.meta.version.clone(),
            changeset: w.meta.changeset.clone(),
            timestamp: w.meta.timestamp.clone(),
        };
        let nodes = w
            .node_refs
            .iter()
            .enumerate()
            .map(|(position, &node_id)| WayNodeRow { id: w.id, node_id, position })
            .collect();
        let tags = self.shape_tags(w.id, &w.tags, stats)?;
        Ok(ShapedRecord::Way { way, nodes, tags })
    }

    fn shape_tags(&self, id: i64, tags: &[Tag], stats: &mut ShapeStats) -> Result<Vec<TagRow>, EtlError> {
        let mut out = Vec::with_capacity(tags.len());
        for tag in tags {
            if has_problem_chars(&tag.key) {
                stats.malformed_keys += 1;
                tracing::debug!(id, key = %tag.key, "dropping tag with malformed key");
                continue;
            }
            let value = match self.normalize_value(&tag.key, &tag.value) {
                Ok(v) => v,
                Err(e) => {
                    stats.unknown_values += 1;
                    match self.policy {
                        UnknownValuePolicy::PassThrough => {
                            tracing::warn!(id, key = %tag.key, value = %tag.value, "no canonical form; keeping value");
                            tag.value.clone()
                        }
                        UnknownValuePolicy::DropTag => {
                            tracing::warn!(id, key = %tag.key, value = %tag.value, "no canonical form; dropping tag");
                            continue;
                        }
                        UnknownValuePolicy::Fail => return Err(e.into()),
                    }
                }
            };
            let (tag_type, key) = split_key(&tag.key);
            out.push(TagRow { id, key: key.to_string(), value, tag_type: tag_type.to_string() });
        }
        Ok(out)
    }

    fn normalize_value(&self, key: &str, value: &str) -> Result<String, NormalizationError> {
        match TagKind::of(key) {
            TagKind::Street => Ok(self.rules.normalize_street(value)),
            TagKind::City => self.rules.normalize_city(value),
            TagKind::Other => Ok(value.to_string()),
        }
    }
}
