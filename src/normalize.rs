//! Value normalizers: street-type suffix expansion and city-name canonicalization.
//!
//! Rule tables are plain data held in [`NormalizationRules`], built once and
//! shared by reference with the shaper.

use crate::error::NormalizationError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;

/// Tag key whose value is a street name with a type suffix.
pub const STREET_KEY: &str = "tiger:name_type";
/// Tag key whose value is a city name.
pub const CITY_KEY: &str = "addr:city";

fn street_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b\S+\.?$").expect("valid regex"))
}

/// Trailing token of a street name (the presumed street type), with its byte span.
pub fn street_type(value: &str) -> Option<(usize, usize, &str)> {
    street_type_re()
        .find(value)
        .map(|m| (m.start(), m.end(), m.as_str()))
}

/// Serialized form of the rule tables (JSON).
#[derive(Debug, Deserialize)]
struct RulesFile {
    street_types: BTreeMap<String, String>,
    expected_street_types: Vec<String>,
    city_aliases: BTreeMap<String, String>,
    canonical_cities: Vec<String>,
}

/// Immutable normalization tables.
#[derive(Clone, Debug)]
pub struct NormalizationRules {
    // abbreviation (lowercased) -> canonical
    street_types: HashMap<String, String>,
    expected_street_types: BTreeSet<String>,
    city_aliases: HashMap<String, String>,
    canonical_cities: BTreeSet<String>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        let street_types = [
            ("St", "Street"), ("St.", "Street"), ("Ave", "Avenue"), ("Rd.", "Road"),
            ("Rd", "Road"), ("Hwy", "Highway"), ("Dr", "Drive"), ("Xing", "Crossing"),
            ("Ln", "Lane"), ("Pl", "Plaza"), ("Plz", "Plaza"), ("Way", "Way"),
            ("Trl", "Trail"), ("Sq", "Square"), ("Aly", "Alley"), ("Cir", "Circle"),
            ("Trc", "Trace"), ("Trce", "Trace"), ("Rte", "Route"), ("Pky", "Parkway"),
            ("Blvd", "Boulevard"), ("Ter", "Terrace"), ("Cv", "Cove"), ("Ct", "Court"),
            ("Loop", "Loop"), ("Pass", "Pass"), ("Path", "Path"), ("Run", "Run"),
            ("Fwy", "Freeway"), ("Walk", "Walk"),
        ];
        let expected = [
            "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane",
            "Road", "Trail", "Parkway", "Commons", "Crossing", "Route", "Highway", "Way",
            "Plaza", "Path", "Alley", "Circle", "Trace", "Loop", "Walk", "Pass", "Terrace",
            "Cove", "Run", "Freeway",
        ];
        let city_aliases = [
            ("Columbia, SC", "Columbia"),
            ("W. Columbia", "West Columbia"),
            ("Fort Jackson", "Columbia"),
        ];
        let canonical = ["Columbia", "West Columbia", "Forest Acres", "Irmo"];

        Self::from_parts(
            street_types.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            expected.iter().map(|s| s.to_string()),
            city_aliases.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            canonical.iter().map(|s| s.to_string()),
        )
    }
}

impl NormalizationRules {
    pub fn from_parts(
        street_types: impl IntoIterator<Item = (String, String)>,
        expected_street_types: impl IntoIterator<Item = String>,
        city_aliases: impl IntoIterator<Item = (String, String)>,
        canonical_cities: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut expected: BTreeSet<String> = expected_street_types.into_iter().collect();
        let street_types: HashMap<String, String> = street_types
            .into_iter()
            .map(|(abbr, canon)| {
                expected.insert(canon.clone());
                (abbr.to_lowercase(), canon)
            })
            .collect();
        Self {
            street_types,
            expected_street_types: expected,
            city_aliases: city_aliases.into_iter().collect(),
            canonical_cities: canonical_cities.into_iter().collect(),
        }
    }

    /// Load tables from a JSON file with keys `street_types`,
    /// `expected_street_types`, `city_aliases`, `canonical_cities`.
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read rules {}", path.display()))?;
        let file: RulesFile = serde_json::from_str(&raw)
            .with_context(|| format!("parse rules {}", path.display()))?;
        Ok(Self::from_parts(
            file.street_types,
            file.expected_street_types,
            file.city_aliases,
            file.canonical_cities,
        ))
    }

    pub fn is_expected_street_type(&self, token: &str) -> bool {
        self.expected_street_types.contains(token)
    }

    fn canonical_street_type(&self, token: &str) -> Option<&str> {
        self.street_types.get(&token.to_lowercase()).map(String::as_str)
    }

    /// Expand the trailing street-type abbreviation, e.g. `"123 Main St"` ->
    /// `"123 Main Street"`. Values whose suffix has no rule come back unchanged.
    ///
    /// The replacement is spliced at the suffix's own position, so an identical
    /// token earlier in the name is left alone.
    pub fn normalize_street(&self, value: &str) -> String {
        let Some((start, end, token)) = street_type(value) else {
            return value.to_string();
        };
        match self.canonical_street_type(token) {
            Some(canon) if canon != token => {
                let mut out = String::with_capacity(value.len() + canon.len());
                out.push_str(&value[..start]);
                out.push_str(canon);
                out.push_str(&value[end..]);
                out
            }
            _ => value.to_string(),
        }
    }

    /// Map a city name onto its canonical spelling.
    ///
    /// Canonical names pass through; known aliases are replaced; anything else
    /// is an error the caller must decide how to handle.
    pub fn normalize_city(&self, value: &str) -> Result<String, NormalizationError> {
        if self.canonical_cities.contains(value) {
            return Ok(value.to_string());
        }
        self.city_aliases
            .get(value)
            .cloned()
            .ok_or_else(|| NormalizationError { kind: "city", value: value.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_trailing_abbreviation() {
        let r = NormalizationRules::default();
        assert_eq!(r.normalize_street("123 Main St"), "123 Main Street");
        assert_eq!(r.normalize_street("Two Notch Rd."), "Two Notch Road");
        assert_eq!(r.normalize_street("Assembly ST"), "Assembly Street");
        assert_eq!(r.normalize_street("Gervais Street"), "Gervais Street");
        assert_eq!(r.normalize_street("Unknown Xyz"), "Unknown Xyz");
        assert_eq!(r.normalize_street(""), "");
    }

    #[test]
    fn substitutes_at_suffix_not_first_occurrence() {
        let r = NormalizationRules::default();
        assert_eq!(r.normalize_street("St Andrews St"), "St Andrews Street");
        assert_eq!(r.normalize_street("Dr Martin Dr"), "Dr Martin Drive");
    }

    #[test]
    fn street_normalization_is_idempotent() {
        let r = NormalizationRules::default();
        for v in ["123 Main St", "Park Pky", "Elm Ct", "Harbison Blvd", "Bush River Rd."] {
            let once = r.normalize_street(v);
            assert_eq!(r.normalize_street(&once), once, "not a fixed point: {v}");
        }
    }

    #[test]
    fn city_aliases_and_canonical_names() {
        let r = NormalizationRules::default();
        assert_eq!(r.normalize_city("Fort Jackson").unwrap(), "Columbia");
        assert_eq!(r.normalize_city("Columbia").unwrap(), "Columbia");
        assert_eq!(r.normalize_city("W. Columbia").unwrap(), "West Columbia");
        let again = r.normalize_city("West Columbia").unwrap();
        assert_eq!(again, "West Columbia");

        let err = r.normalize_city("Lexington").unwrap_err();
        assert_eq!(err.value, "Lexington");
    }

    #[test]
    fn city_normalization_is_idempotent() {
        let r = NormalizationRules::default();
        let inputs = r.city_aliases.keys().chain(r.canonical_cities.iter());
        for v in inputs {
            let once = r.normalize_city(v).unwrap();
            assert_eq!(r.normalize_city(&once).unwrap(), once, "not a fixed point: {v}");
        }
    }
}
