//! Data-quality audits over a whole document. These are read-only passes
//! built on the same reader, classifier and rule tables as the pipeline.

use crate::model::ElementKind;
use crate::normalize::{street_type, NormalizationRules, STREET_KEY};
use crate::source::open_document;
use crate::stream::ElementStream;
use crate::tags::classify_key;
use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const READ_BUF: usize = 256 * 1024;
const ALL_KINDS: [ElementKind; 3] = [ElementKind::Node, ElementKind::Way, ElementKind::Relation];

/// Tag key category counts. Categories overlap except `other`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyTypeCounts {
    pub lower: u64,
    pub lower_colon: u64,
    pub problem_chars: u64,
    pub other: u64,
}

/// Frequency of every element name in the document (`osm`, `node`, `tag`, ...).
pub fn count_elements(path: &Path) -> Result<BTreeMap<String, u64>> {
    let mut reader = Reader::from_reader(open_document(path, READ_BUF, None)?);
    let mut buf = Vec::new();
    let mut counts = BTreeMap::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        match ev {
            Event::Start(e) | Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                *counts.entry(name).or_insert(0) += 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(counts)
}

/// Classify the key of every `tag` in the document.
pub fn count_key_types(path: &Path) -> Result<KeyTypeCounts> {
    let mut counts = KeyTypeCounts::default();
    for item in ElementStream::new(open_document(path, READ_BUF, None)?, &ALL_KINDS) {
        let el = item.with_context(|| format!("reading {}", path.display()))?;
        for key in el.children_named("tag").filter_map(|t| t.attr("k")) {
            let class = classify_key(key);
            counts.lower += class.lower as u64;
            counts.lower_colon += class.lower_colon as u64;
            counts.problem_chars += class.problem_chars as u64;
            counts.other += class.is_other() as u64;
        }
    }
    Ok(counts)
}

/// Street names (under the street key) whose trailing token is not an expected
/// street type, grouped by that token. Feeds the abbreviation table.
pub fn audit_street_types(path: &Path, rules: &NormalizationRules) -> Result<BTreeMap<String, BTreeSet<String>>> {
    let mut found: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let kinds = [ElementKind::Node, ElementKind::Way];
    for item in ElementStream::new(open_document(path, READ_BUF, None)?, &kinds) {
        let el = item.with_context(|| format!("reading {}", path.display()))?;
        let streets = el
            .children_named("tag")
            .filter(|t| t.attr("k") == Some(STREET_KEY))
            .filter_map(|t| t.attr("v"));
        for name in streets {
            if let Some((_, _, token)) = street_type(name) {
                if !rules.is_expected_street_type(token) {
                    found.entry(token.to_string()).or_default().insert(name.to_string());
                }
            }
        }
    }
    Ok(found)
}
