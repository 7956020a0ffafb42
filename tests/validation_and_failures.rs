#[path = "common/mod.rs"]
mod common;

use common::*;
use oetl::{CancellationToken, EtlError, OsmETL, UnknownValuePolicy, NODES_FILE, NODE_TAGS_FILE, WAY_NODES_FILE};

fn bad_lat_doc() -> String {
    osm_doc(&[
        node(1, &[]),
        r#"<node id="2" lat="north" lon="-81.0" user="x" uid="abc" version="1" changeset="5" timestamp="2016-03-01T12:00:00Z"/>"#
            .to_string(),
        node(3, &[]),
    ])
}

/// Dry run over every element collects each failing record with all of its
/// field errors, and writes nothing.
#[test]
fn dry_run_reports_every_bad_field() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_doc(tmp.path(), "bad.osm", &bad_lat_doc());
    let out = tmp.path().join("out");

    let report = OsmETL::new()
        .input(&input)
        .out_dir(&out)
        .sample(1, 100)
        .progress(false)
        .validate_sample()
        .unwrap();

    assert_eq!(report.checked, 3);
    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 1);
    let err = &report.failures[0];
    assert_eq!(err.element_id, 2);
    assert_eq!(err.relations().collect::<Vec<_>>(), vec!["node"]);
    let fields: Vec<&str> = err.failures[0].errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["lat", "uid"]);
    assert!(!out.exists(), "dry run must not create outputs");
}

/// The sample stride and limit bound the dry run.
#[test]
fn dry_run_respects_stride_and_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let elements: Vec<String> = (1..=20).map(|i| node(i, &[])).collect();
    let input = write_doc(tmp.path(), "many.osm", &osm_doc(&elements));

    let report = OsmETL::new().input(&input).sample(3, 4).progress(false).validate_sample().unwrap();
    assert_eq!(report.checked, 4);
    assert!(report.is_clean());
}

/// `run()` refuses the full pass when the sample is dirty.
#[test]
fn run_stops_before_full_pass_on_schema_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_doc(tmp.path(), "bad.osm", &bad_lat_doc());
    let out = tmp.path().join("out");

    let err = OsmETL::new().input(&input).out_dir(&out).sample(1, 10).progress(false).run().unwrap_err();
    match err.downcast_ref::<EtlError>() {
        Some(EtlError::SchemaValidation { checked, failures }) => {
            assert_eq!(*checked, 3);
            let ids: Vec<i64> = failures.iter().map(|f| f.element_id).collect();
            assert_eq!(ids, vec![2]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!out.join(NODES_FILE).exists());
}

/// Every failing sampled record is carried by the error, not only the first.
#[test]
fn run_reports_all_failing_sampled_records() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = osm_doc(&[
        r#"<node id="5" lat="north" lon="-81.0" user="x" uid="1" version="1" changeset="5" timestamp="2016-03-01T12:00:00Z"/>"#
            .to_string(),
        node(6, &[]),
        r#"<node id="7" lat="34.0" lon="-81.0" user="x" uid="abc" version="1" changeset="5" timestamp="2016-03-01T12:00:00Z"/>"#
            .to_string(),
    ]);
    let input = write_doc(tmp.path(), "two_bad.osm", &doc);

    let err = OsmETL::new()
        .input(&input)
        .out_dir(tmp.path().join("out"))
        .sample(1, 10)
        .progress(false)
        .run()
        .unwrap_err();
    match err.downcast_ref::<EtlError>() {
        Some(EtlError::SchemaValidation { failures, .. }) => {
            let ids: Vec<i64> = failures.iter().map(|f| f.element_id).collect();
            assert_eq!(ids, vec![5, 7]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let text = format!("{err:#}");
    assert!(text.contains("element 5") && text.contains("element 7"), "{text}");
    assert!(text.contains("2 of 3 sampled records"), "{text}");
}

/// Empty tag values are legal OSM and do not block the full run.
#[test]
fn empty_tag_value_passes_dry_run() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = osm_doc(&[node(1, &[("note", "")]), node(2, &[])]);
    let input = write_doc(tmp.path(), "empty_value.osm", &doc);
    let out = tmp.path().join("out");

    let summary = OsmETL::new().input(&input).out_dir(&out).sample(1, 10).progress(false).run().unwrap();
    assert_eq!(summary.counts.node_tags, 1);
    let (_, rows) = read_csv(&out.join(NODE_TAGS_FILE));
    assert_eq!(rows, vec![vec!["1".to_string(), "note".into(), "".into(), "regular".into()]]);
}

/// A clean sample lets `run()` proceed to the full pass.
#[test]
fn run_completes_on_clean_input() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_doc(tmp.path(), "map.osm", &basic_doc());
    let out = tmp.path().join("out");

    let summary = OsmETL::new().input(&input).out_dir(&out).sample(1, 10).progress(false).run().unwrap();
    assert_eq!(summary.counts.nodes, 3);
    assert!(out.join(WAY_NODES_FILE).exists());
}

/// A missing required attribute aborts the run, names the element, and leaves
/// only staging files behind.
#[test]
fn missing_attribute_aborts_without_final_files() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = osm_doc(&[
        node(1, &[]),
        r#"<way id="7" user="x" uid="1" version="1" changeset="1"><nd ref="1"/></way>"#.to_string(),
    ]);
    let input = write_doc(tmp.path(), "broken.osm", &doc);
    let out = tmp.path().join("out");

    let err = OsmETL::new().input(&input).out_dir(&out).progress(false).process_map().unwrap_err();
    match err.downcast_ref::<EtlError>() {
        Some(EtlError::MissingRequiredField { element, id, field }) => {
            assert_eq!((*element, id.as_str(), *field), ("way", "7", "timestamp"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!out.join(NODES_FILE).exists());
    let staged = std::fs::read_to_string(out.join(format!("{NODES_FILE}.inprogress"))).unwrap();
    assert_eq!(staged.lines().count(), 2, "header plus the node written before the failure");
}

/// With the `Fail` policy an unknown city aborts the run.
#[test]
fn unknown_city_fails_when_configured() {
    let tmp = tempfile::tempdir().unwrap();
    let doc = osm_doc(&[node(4711, &[("addr:city", "Lexington")])]);
    let input = write_doc(tmp.path(), "city.osm", &doc);

    let lenient = OsmETL::new()
        .input(&input)
        .out_dir(tmp.path().join("a"))
        .progress(false)
        .process_map()
        .unwrap();
    assert_eq!(lenient.stats.unknown_values, 1);
    assert_eq!(lenient.counts.node_tags, 1);

    let err = OsmETL::new()
        .input(&input)
        .out_dir(tmp.path().join("b"))
        .unknown_values(UnknownValuePolicy::Fail)
        .progress(false)
        .process_map()
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<EtlError>(), Some(EtlError::UnknownNormalizationValue(_))));
    let text = format!("{err:#}");
    assert!(text.contains("node 4711"), "{text}");
    assert!(text.contains("Lexington"), "{text}");

    let err = OsmETL::new()
        .input(&input)
        .unknown_values(UnknownValuePolicy::Fail)
        .sample(1, 10)
        .progress(false)
        .validate_sample()
        .unwrap_err();
    assert!(format!("{err:#}").contains("node 4711"), "{err:#}");
}

/// A cancelled run stops consuming input, still closes and promotes its outputs,
/// and reports the cancellation.
#[test]
fn cancelled_run_closes_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_doc(tmp.path(), "map.osm", &basic_doc());
    let out = tmp.path().join("out");
    let token = CancellationToken::new();
    token.cancel();

    let summary = OsmETL::new()
        .input(&input)
        .out_dir(&out)
        .cancellation(token)
        .progress(false)
        .process_map()
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.elements, 0);
    assert_eq!(summary.counts.total(), 0);
    let (header, rows) = read_csv(&out.join(NODES_FILE));
    assert_eq!(header.len(), 8);
    assert!(rows.is_empty());
}
