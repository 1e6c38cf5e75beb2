use std::fs;
use tempfile::TempDir;
use zerogravity::dataset::historical_events;
use zerogravity::export::{sha256_hex, to_csv, write_csv, CSV_COLUMNS};

#[test]
fn writes_csv_and_manifest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("zeros_history.csv");
    let manifest = write_csv(&path, &historical_events()).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(manifest.rows, 26);
    assert_eq!(manifest.bytes, written.len());
    assert_eq!(manifest.hash_sha256, sha256_hex(written.as_bytes()));
    assert_eq!(written.lines().next().unwrap(), CSV_COLUMNS.join(","));
}

#[test]
fn export_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let a = write_csv(&dir.path().join("a.csv"), &historical_events()).unwrap();
    let b = write_csv(&dir.path().join("b.csv"), &historical_events()).unwrap();
    assert_eq!(a.hash_sha256, b.hash_sha256);
}

#[test]
fn every_row_has_eight_fields() {
    let csv = to_csv(&historical_events());
    for line in csv.lines() {
        assert_eq!(line.split(',').count(), 8, "bad line: {}", line);
    }
}
