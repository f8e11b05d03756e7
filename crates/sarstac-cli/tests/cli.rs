use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn sarstac() -> Command {
    Command::cargo_bin("sarstac").unwrap()
}

#[test]
fn test_providers_lists_registry() {
    sarstac()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("capella"))
        .stdout(predicate::str::contains("iceye"))
        .stdout(predicate::str::contains("umbra"))
        .stdout(predicate::str::contains("sar:product_type"));
}

#[test]
fn test_unknown_provider_fails() {
    let input = TempDir::new().unwrap();
    sarstac()
        .args(["process", "sentinel", "--input"])
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provider 'sentinel' not found"))
        .stderr(predicate::str::contains("sarstac providers"));
}

#[test]
fn test_process_requires_provider() {
    sarstac()
        .args(["process", "--input", "."])
        .assert()
        .failure();
}

#[test]
fn test_relative_base_url_fails() {
    let input = TempDir::new().unwrap();
    sarstac()
        .args(["process", "iceye", "--base-url", "mirror.example", "--input"])
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid base-url option"));
}

#[test]
fn test_process_writes_tables() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let items = input.path().join("iceye");
    fs::create_dir_all(&items).unwrap();
    let item = json!({
        "id": "X001",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
        },
        "properties": {"datetime": "2024-01-01T00:00:00Z", "sar:polarizations": ["VV"]},
        "assets": {"a": {"href": "https://x/y.tif", "type": "image/tiff"}},
        "links": [{"rel": "self", "href": "https://x/X001.json"}]
    });
    fs::write(items.join("X001.json"), item.to_string()).unwrap();

    sarstac()
        .args(["process", "iceye", "--input"])
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .args(["--base-url", "https://x", "--show-schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary"))
        .stdout(predicate::str::contains("Schema: iceye (map)"))
        .stdout(predicate::str::contains("stac_item_url"));

    let map = output.path().join("iceye").join("iceye.geojson");
    let ard = output.path().join("ard").join("iceye").join("iceye.geojson");
    assert!(map.exists());
    assert!(ard.exists());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(ard).unwrap()).unwrap();
    assert_eq!(
        written["features"][0]["properties"]["asset_a"],
        "https://x/y.tif"
    );
}

#[test]
fn test_process_continues_past_missing_provider() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let items = input.path().join("capella");
    fs::create_dir_all(&items).unwrap();
    let item = json!({
        "id": "C1",
        "geometry": {"type": "Point", "coordinates": [5.0, 6.0]},
        "properties": {"datetime": "2024-01-01T00:00:00Z", "sar:product_type": "GEO"}
    });
    fs::write(items.join("C1.json"), item.to_string()).unwrap();

    sarstac()
        .args(["process", "capella", "umbra", "--kind", "map", "--input"])
        .arg(input.path())
        .arg("--output")
        .arg(output.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Directory not found"));

    assert!(output.path().join("capella/capella_GEO.geojson").exists());
    assert!(!output.path().join("ard").exists());
}
