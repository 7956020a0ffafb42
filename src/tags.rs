//! Tag key classification: lowercase, namespaced (`prefix:suffix`), or carrying
//! characters that are not allowed in a normalized field name.

use regex::Regex;
use std::sync::OnceLock;

/// Tag type assigned when a key carries no namespace prefix.
pub const DEFAULT_TAG_TYPE: &str = "regular";

fn lower_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|_)*$").expect("valid regex"))
}

fn lower_colon_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|_)*:([a-z]|_)*$").expect("valid regex"))
}

// Unanchored at the end: `addr:street:name` still splits as (addr, street:name).
fn namespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|_)+:([a-z]|_)+").expect("valid regex"))
}

fn problem_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[=+/&<>;'"?%#$@,. \t\r\n]"#).expect("valid regex"))
}

/// Which of the audit categories a key falls into. The categories overlap:
/// a key can be both `lower_colon` and contain a problem character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyClass {
    pub lower: bool,
    pub lower_colon: bool,
    pub problem_chars: bool,
}

impl KeyClass {
    /// True when the key matched none of the three patterns.
    pub fn is_other(&self) -> bool {
        !(self.lower || self.lower_colon || self.problem_chars)
    }
}

pub fn classify_key(key: &str) -> KeyClass {
    KeyClass {
        lower: lower_re().is_match(key),
        lower_colon: lower_colon_re().is_match(key),
        problem_chars: has_problem_chars(key),
    }
}

#[inline]
pub fn has_problem_chars(key: &str) -> bool {
    problem_chars_re().is_match(key)
}

/// Split a key into `(type, key)`: namespaced keys split on the first colon,
/// everything else keeps the whole key under [`DEFAULT_TAG_TYPE`].
pub fn split_key(key: &str) -> (&str, &str) {
    if namespace_re().is_match(key) {
        if let Some((prefix, rest)) = key.split_once(':') {
            return (prefix, rest);
        }
    }
    (DEFAULT_TAG_TYPE, key)
}
