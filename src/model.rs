//! Parsed elements and the flat rows they are shaped into.

use crate::error::EtlError;
use serde::Serialize;
use std::fmt;

/// Top-level OSM element kinds the reader can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"node" => Some(Self::Node),
            b"way" => Some(Self::Way),
            b"relation" => Some(Self::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direct child of a top-level element (`tag`, `nd`, `member`, ...), attributes only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChild {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl RawChild {
    pub fn attr(&self, key: &str) -> Option<&str> {
        lookup(&self.attrs, key)
    }
}

/// One top-level element exactly as read, before any typing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<RawChild>,
}

impl RawElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        lookup(&self.attrs, key)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RawChild> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Attribution carried by every node and way. All values are kept as the
/// strings found in the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribution {
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: i64,
    pub lat: String,
    pub lon: String,
    pub meta: Attribution,
    pub tags: Vec<Tag>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Way {
    pub id: i64,
    pub meta: Attribution,
    /// Referenced node ids in document order; repeats are meaningful.
    pub node_refs: Vec<i64>,
    pub tags: Vec<Tag>,
}

/// A node or way with every required attribute present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OsmElement {
    Node(Node),
    Way(Way),
}

impl OsmElement {
    pub fn id(&self) -> i64 {
        match self {
            Self::Node(n) => n.id,
            Self::Way(w) => w.id,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Node(_) => ElementKind::Node,
            Self::Way(_) => ElementKind::Way,
        }
    }
}

impl TryFrom<&RawElement> for OsmElement {
    type Error = EtlError;

    fn try_from(raw: &RawElement) -> Result<Self, Self::Error> {
        let element = raw.kind.as_str();
        let raw_id = raw.attr("id").unwrap_or("?").to_string();
        let required = |field: &'static str| -> Result<String, EtlError> {
            raw.attr(field).map(str::to_string).ok_or_else(|| EtlError::MissingRequiredField {
                element,
                id: raw_id.clone(),
                field,
            })
        };

        let id_str = required("id")?;
        let id = parse_int(element, &raw_id, "id", &id_str)?;

        // Required attributes are checked in output column order.
        let (lat, lon) = match raw.kind {
            ElementKind::Node => (Some(required("lat")?), Some(required("lon")?)),
            ElementKind::Way => (None, None),
            ElementKind::Relation => {
                return Err(EtlError::UnsupportedElement(element.to_string()))
            }
        };
        let meta = Attribution {
            user: required("user")?,
            uid: required("uid")?,
            version: required("version")?,
            changeset: required("changeset")?,
            timestamp: required("timestamp")?,
        };

        let mut tags = Vec::new();
        for child in raw.children_named("tag") {
            match (child.attr("k"), child.attr("v")) {
                (Some(k), Some(v)) => tags.push(Tag { key: k.to_string(), value: v.to_string() }),
                _ => tracing::debug!(element, id = %raw_id, "tag without k/v ignored"),
            }
        }

        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(Self::Node(Node { id, lat, lon, meta, tags })),
            _ => {
                let mut node_refs = Vec::new();
                for nd in raw.children_named("nd") {
                    let r = nd.attr("ref").ok_or_else(|| EtlError::MissingRequiredField {
                        element: "nd",
                        id: raw_id.clone(),
                        field: "ref",
                    })?;
                    node_refs.push(parse_int("nd", &raw_id, "ref", r)?);
                }
                Ok(Self::Way(Way { id, meta, node_refs, tags }))
            }
        }
    }
}

fn parse_int(element: &'static str, id: &str, field: &'static str, value: &str) -> Result<i64, EtlError> {
    value.trim().parse::<i64>().map_err(|_| EtlError::InvalidAttribute {
        element,
        id: id.to_string(),
        field,
        value: value.to_string(),
    })
}

// ----------------------------- Output rows ------------------------------------
// Field order of every row struct is the CSV column order.

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeRow {
    pub id: i64,
    pub lat: String,
    pub lon: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WayRow {
    pub id: i64,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

/// Secondary tag row, shared by `nodes_tags` and `ways_tags`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagRow {
    pub id: i64,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WayNodeRow {
    pub id: i64,
    pub node_id: i64,
    pub position: usize,
}

/// Rows produced from one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapedRecord {
    Node { node: NodeRow, tags: Vec<TagRow> },
    Way { way: WayRow, nodes: Vec<WayNodeRow>, tags: Vec<TagRow> },
}

impl ShapedRecord {
    pub fn id(&self) -> i64 {
        match self {
            Self::Node { node, .. } => node.id,
            Self::Way { way, .. } => way.id,
        }
    }

    pub fn tags(&self) -> &[TagRow] {
        match self {
            Self::Node { tags, .. } | Self::Way { tags, .. } => tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn node_attrs() -> Vec<(String, String)> {
        attrs(&[
            ("id", "1"), ("lat", "34.0"), ("lon", "-81.0"), ("user", "u"), ("uid", "7"),
            ("version", "2"), ("changeset", "9"), ("timestamp", "2015-01-01T00:00:00Z"),
        ])
    }

    #[test]
    fn typed_node_from_raw() {
        let raw = RawElement { kind: ElementKind::Node, attrs: node_attrs(), children: vec![] };
        match OsmElement::try_from(&raw).unwrap() {
            OsmElement::Node(n) => {
                assert_eq!(n.id, 1);
                assert_eq!(n.lat, "34.0");
                assert_eq!(n.meta.timestamp, "2015-01-01T00:00:00Z");
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn missing_attribute_is_reported_with_id() {
        let mut a = node_attrs();
        a.retain(|(k, _)| k != "lon");
        let raw = RawElement { kind: ElementKind::Node, attrs: a, children: vec![] };
        let err = OsmElement::try_from(&raw).unwrap_err();
        match err {
            EtlError::MissingRequiredField { element, id, field } => {
                assert_eq!((element, id.as_str(), field), ("node", "1", "lon"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn relation_is_not_shapeable() {
        let raw = RawElement { kind: ElementKind::Relation, attrs: attrs(&[("id", "5")]), children: vec![] };
        assert!(matches!(OsmElement::try_from(&raw), Err(EtlError::UnsupportedElement(_))));
    }
}
