#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Attribution attributes shared by every fixture element.
pub const META: &str =
    r#"user="mapper" uid="4242" version="2" changeset="31337" timestamp="2016-03-01T12:00:00Z""#;

pub fn node(id: i64, tags: &[(&str, &str)]) -> String {
    let open = format!(r#"<node id="{id}" lat="34.00{id}" lon="-81.05{id}" {META}"#);
    if tags.is_empty() {
        return format!("{open}/>");
    }
    let body: String = tags.iter().map(|(k, v)| format!(r#"<tag k="{k}" v="{v}"/>"#)).collect();
    format!("{open}>{body}</node>")
}

pub fn way(id: i64, refs: &[i64], tags: &[(&str, &str)]) -> String {
    let nds: String = refs.iter().map(|r| format!(r#"<nd ref="{r}"/>"#)).collect();
    let body: String = tags.iter().map(|(k, v)| format!(r#"<tag k="{k}" v="{v}"/>"#)).collect();
    format!(r#"<way id="{id}" {META}>{nds}{body}</way>"#)
}

pub fn osm_doc(elements: &[String]) -> String {
    let mut s = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osm version=\"0.6\" generator=\"test\">\n");
    s.push_str(r#"  <bounds minlat="33.9" minlon="-81.2" maxlat="34.1" maxlon="-80.9"/>"#);
    s.push('\n');
    for e in elements {
        s.push_str("  ");
        s.push_str(e);
        s.push('\n');
    }
    s.push_str("</osm>\n");
    s
}

/// A tiny map around Columbia, SC:
/// - node 1: plain, no tags
/// - node 2: street + city tags needing normalization, plus a malformed key
/// - node 3: city already canonical
/// - way 10: refs [1, 2, 1] with a highway tag and an abbreviated street type
/// - way 11: no node refs, one tag
/// - relation 20: ignored by the shaper
pub fn basic_doc() -> String {
    osm_doc(&[
        node(1, &[]),
        node(2, &[
            ("tiger:name_type", "123 Main St"),
            ("addr:city", "W. Columbia"),
            ("addr:city ,", "Columbia"),
        ]),
        node(3, &[("addr:city", "Columbia"), ("amenity", "cafe")]),
        way(10, &[1, 2, 1], &[("highway", "residential"), ("tiger:name_type", "Gervais Blvd")]),
        way(11, &[], &[("building", "yes")]),
        format!(r#"<relation id="20" {META}><member type="way" ref="10" role="outer"/><tag k="type" v="multipolygon"/></relation>"#),
    ])
}

pub fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Write `content` zstd-compressed.
pub fn write_zst_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let f = File::create(&path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    enc.write_all(content.as_bytes()).unwrap();
    enc.finish().unwrap();
    path
}

/// Read a CSV file into (header, rows).
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut r = csv::Reader::from_path(path).unwrap();
    let header = r.headers().unwrap().iter().map(str::to_string).collect();
    let rows = r
        .records()
        .map(|rec| rec.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
