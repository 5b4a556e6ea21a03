use media_readability::{
    probe::ProbeOutcome,
    report::{file_stem, report_path, JsonFileSink, ReportSink, RunReport},
    verdict::determine_final_status,
};
use std::path::Path;
use tempfile::TempDir;

const SUFFIX: &str = "_readability_test.json";

fn concluded(case_id: &str) -> RunReport {
    let mut report = RunReport::new(case_id, "/dev/sdb", "2025-03-01T10:00:00Z".into(), false);
    let outcomes = [ProbeOutcome::new(1, "Device Presence", false).with_diagnostic("not found")];
    let verdict = determine_final_status(&outcomes);
    report.conclude(verdict).unwrap();
    report
}

#[test]
fn writes_report_named_after_case() {
    let td = TempDir::new().unwrap();
    let out_dir = td.path().join("nested").join("reports");
    let sink = JsonFileSink::new(&out_dir, SUFFIX);

    let report = concluded("PHOTO-2025-001");
    assert_eq!(report.timestamp(), "2025-03-01T10:00:00Z");
    assert!(!report.dry_run());
    let path = sink.persist(&report).unwrap().unwrap();
    assert_eq!(path, out_dir.join("PHOTO-2025-001_readability_test.json"));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["case_id"], "PHOTO-2025-001");
    assert_eq!(json["device"], "/dev/sdb");
    assert_eq!(json["timestamp"], "2025-03-01T10:00:00Z");
    assert_eq!(json["dry_run"], false);
    assert_eq!(json["status"], "UNREADABLE");
    assert_eq!(json["next_step"], 4);
    assert_eq!(json["tests"].as_array().unwrap().len(), 0);
}

#[test]
fn same_case_overwrites_different_cases_coexist() {
    let td = TempDir::new().unwrap();
    let sink = JsonFileSink::new(td.path(), SUFFIX);

    let a1 = sink.persist(&concluded("CASE-A")).unwrap().unwrap();
    let a2 = sink.persist(&concluded("CASE-A")).unwrap().unwrap();
    let b = sink.persist(&concluded("CASE-B")).unwrap().unwrap();

    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert_eq!(std::fs::read_dir(td.path()).unwrap().count(), 2);
}

#[test]
fn unsafe_case_ids_stay_distinct() {
    let ids = ["a/b", "a_b", "a%2Fb", "a b", "..", ".x", "%2Ex", "CASE-1"];
    let stems: std::collections::HashSet<_> = ids.iter().map(|id| file_stem(id)).collect();
    assert_eq!(stems.len(), ids.len());
    for stem in &stems {
        assert!(!stem.contains('/'));
        assert!(!stem.starts_with('.'));
    }
    assert_eq!(file_stem("CASE-1"), "CASE-1");
}

#[test]
fn report_stays_inside_output_dir() {
    let p = report_path(Path::new("/reports"), "../../etc/passwd", SUFFIX);
    assert_eq!(p.parent(), Some(Path::new("/reports")));
}

#[test]
fn refuses_unconcluded_report() {
    let td = TempDir::new().unwrap();
    let sink = JsonFileSink::new(td.path(), SUFFIX);
    let report = RunReport::new("CASE-X", "/dev/sdb", "2025-03-01T10:00:00Z".into(), false);
    assert!(sink.persist(&report).is_err());
    assert_eq!(std::fs::read_dir(td.path()).unwrap().count(), 0);
}

#[test]
fn verdict_is_set_once() {
    let mut report = concluded("CASE-Y");
    let again = determine_final_status(&[ProbeOutcome::new(1, "Device Presence", true)]);
    assert!(report.conclude(again).is_err());
    assert_eq!(report.next_step(), Some(4));
}
