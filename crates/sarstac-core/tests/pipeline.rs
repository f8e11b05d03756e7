use std::fs;
use std::path::Path;

use anyhow::Result;
use sarstac_core::operations::{
    LocalFileFetcher, PipelineConfig, ProviderOutcome, discover_local_items, process_provider,
};
use sarstac_core::providers::Provider;
use sarstac_core::types::OutputKind;
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;

fn write_item(dir: &Path, relative: &str, document: &JsonValue) {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec_pretty(document).unwrap()).unwrap();
}

fn read_features(path: &Path) -> Vec<JsonValue> {
    let text = fs::read_to_string(path).unwrap();
    let collection: JsonValue = serde_json::from_str(&text).unwrap();
    assert_eq!(collection["type"], "FeatureCollection");
    collection["features"].as_array().unwrap().clone()
}

fn square() -> JsonValue {
    json!({
        "type": "Polygon",
        "coordinates": [[[10.0, 20.0, 5.0], [11.0, 20.0, 5.0], [11.0, 21.0, 5.0], [10.0, 21.0, 5.0], [10.0, 20.0, 5.0]]]
    })
}

fn capella_item(id: &str, product_type: Option<&str>) -> JsonValue {
    let mut properties = json!({
        "datetime": "2024-03-01T12:00:00Z",
        "proj:shape": [512, 1024],
        "proj:centroid": {"lat": 20.5, "lon": 10.5},
        "sar:polarizations": ["HH"]
    });
    if let Some(product_type) = product_type {
        properties["sar:product_type"] = json!(product_type);
    }
    json!({
        "type": "Feature",
        "id": id,
        "geometry": square(),
        "properties": properties,
        "assets": {
            "HH": {"href": "./image.tif", "type": "image/tiff", "roles": ["data"]},
            "metadata": {"href": "https://cdn.example/meta.json", "type": "application/json"}
        },
        "links": [{"rel": "root", "href": "../catalog.json"}]
    })
}

/// Capella output is split into one file per product type
#[tokio::test]
async fn test_capella_partitions_by_product_type() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    write_item(input.path(), "2024/a.json", &capella_item("A", Some("GEC")));
    write_item(input.path(), "2024/b.json", &capella_item("B", Some("SLC")));
    write_item(input.path(), "2024/c.json", &capella_item("C", Some("GEC")));
    write_item(input.path(), "2025/d.json", &capella_item("D", None));

    let locations =
        discover_local_items(input.path(), Some("https://capella.example/stac")).await?;
    assert_eq!(locations.len(), 4);
    assert_eq!(
        locations[0].item_url,
        "https://capella.example/stac/2024/a.json"
    );

    let config = PipelineConfig::new(output.path());
    let run = process_provider(&LocalFileFetcher, Provider::Capella, &locations, &config).await?;
    assert_eq!(run.discovered, 4);
    assert_eq!(run.kinds.len(), 2);
    assert_eq!(run.rows_written(), 8);

    let map = &run.kinds[0];
    assert_eq!(map.kind, OutputKind::Map);
    let names: Vec<_> = map.written.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["capella_GEC", "capella_SLC", "capella_unknown"]);

    let gec = read_features(&output.path().join("capella/capella_GEC.geojson"));
    assert_eq!(gec.len(), 2);
    let feature = &gec[0];
    assert_eq!(feature["id"], "A");
    assert_eq!(feature["geometry"]["coordinates"][0][0], json!([10.0, 20.0]));

    let properties = &feature["properties"];
    assert!(properties.get("sar:product_type").is_none());
    assert!(properties.get("proj:centroid").is_none());
    assert!(properties.get("proj:shape").is_none());
    assert_eq!(properties["rows"], 512);
    assert_eq!(properties["cols"], 1024);
    assert_eq!(properties["provider"], "capella");
    assert_eq!(
        properties["assets"]["HH"]["href"],
        "https://capella.example/stac/2024/image.tif"
    );
    assert_eq!(
        properties["links"][0]["href"],
        "https://capella.example/stac/catalog.json"
    );

    let ard = read_features(&output.path().join("ard/capella/capella_SLC.geojson"));
    assert_eq!(ard.len(), 1);
    assert_eq!(
        ard[0]["properties"]["stac_item_url"],
        "https://capella.example/stac/2024/b.json"
    );
    assert_eq!(ard[0]["properties"]["asset_HH"], "./image.tif");
    Ok(())
}

/// ICEYE output keeps one file, with the processor pulled out of the
/// processing software structure
#[tokio::test]
async fn test_iceye_cleaning() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    write_item(
        input.path(),
        "X001.json",
        &json!({
            "id": "X001",
            "geometry": square(),
            "properties": {
                "start_datetime": "2024-01-01T00:00:00Z",
                "end_datetime": "2024-01-01T00:00:10Z",
                "processing:software": {"processor": "ICEYE-P", "version": "3.1"},
                "raster:bands": [{"data_type": "float32"}],
                "proj:shape": [100, 200]
            },
            "assets": {"GRD-TIF": {"href": "https://x/y.tif", "type": "image/tiff"}},
            "links": []
        }),
    );

    let locations = discover_local_items(input.path(), Some("https://x")).await?;
    let config = PipelineConfig::new(output.path()).with_kinds(vec![OutputKind::Map]);
    let run = process_provider(&LocalFileFetcher, Provider::Iceye, &locations, &config).await?;

    assert_eq!(run.kinds.len(), 1);
    assert_eq!(run.kinds[0].written.len(), 1);
    assert!(!output.path().join("ard").exists());

    let features = read_features(&output.path().join("iceye/iceye.geojson"));
    assert_eq!(features.len(), 1);
    let properties = &features[0]["properties"];
    assert_eq!(properties["processing:software"], "ICEYE-P");
    assert!(properties.get("raster:bands").is_none());
    assert_eq!(properties["rows"], 100);
    assert_eq!(properties["cols"], 200);
    assert!(
        properties["start_datetime"]
            .as_str()
            .unwrap()
            .starts_with("2024-01-01T00:00:00")
    );
    Ok(())
}

/// Umbra assets are rebuilt from their titles and renamed, and the self link
/// is pinned to the item URL
#[tokio::test]
async fn test_umbra_asset_and_link_repair() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let stem = "2025-06-22-23-57-52_UMBRA-10";
    write_item(
        input.path(),
        &format!("tasks/Site/{stem}/{stem}.stac.v2.json"),
        &json!({
            "id": "umbra-1",
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
            "properties": {"datetime": "2025-06-22T23:57:52Z"},
            "assets": {
                "2025-06-22-23-57-52_UMBRA-10_CSI_MM.tif": {
                    "href": "s3://private/csi_mm.tif",
                    "title": "CSI-MM",
                    "type": "image/tiff"
                },
                "2025-06-22-23-57-52_UMBRA-10_SICD.nitf": {
                    "href": "s3://private/sicd.nitf",
                    "title": "SICD"
                },
                "thumbnail": {"href": "s3://private/thumb.png", "title": "Preview"}
            },
            "links": [
                {"rel": "self", "href": "s3://private/item.json"},
                {"rel": "collection", "href": "../collection.json"},
                {"rel": "self", "href": "s3://private/other.json"}
            ]
        }),
    );

    let base = "https://umbra.example/sar-data";
    let locations = discover_local_items(input.path(), Some(base)).await?;
    let item_url = format!("{base}/tasks/Site/{stem}/{stem}.stac.v2.json");
    assert_eq!(locations[0].item_url, item_url);

    let config = PipelineConfig::new(output.path());
    let run = process_provider(&LocalFileFetcher, Provider::Umbra, &locations, &config).await?;
    assert_eq!(run.rows_written(), 2);

    let features = read_features(&output.path().join("umbra/umbra.geojson"));
    let properties = &features[0]["properties"];
    let assets = properties["assets"].as_object().unwrap();
    let keys: Vec<_> = assets.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["csi_mm", "sicd"]);
    assert_eq!(
        assets["csi_mm"]["href"],
        format!("{base}/tasks/Site/{stem}/{stem}_CSI.tif")
    );
    assert_eq!(assets["sicd"]["title"], "SICD");

    let links = properties["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["rel"], "self");
    assert_eq!(links[0]["href"], item_url.as_str());
    assert_eq!(links[0]["type"], "application/json");

    let ard = read_features(&output.path().join("ard/umbra/umbra.geojson"));
    let ard_properties = &ard[0]["properties"];
    assert_eq!(
        ard_properties["asset_csi_mm"],
        format!("{base}/tasks/Site/{stem}/2025-06-22-23-57-52_UMBRA-10_CSI_MM.tif")
    );
    assert_eq!(
        ard_properties["asset_preview"],
        format!("{base}/tasks/Site/{stem}/thumbnail")
    );
    Ok(())
}

/// Unreadable documents and items without geometry never abort a run
#[tokio::test]
async fn test_bad_items_are_isolated() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    write_item(input.path(), "good.json", &capella_item("good", Some("GEO")));
    write_item(
        input.path(),
        "no_geometry.json",
        &json!({"id": "nogeo", "geometry": null, "properties": {}}),
    );
    write_item(
        input.path(),
        "bad_date.json",
        &json!({"id": "bad", "geometry": square(), "properties": {"datetime": "yesterday"}}),
    );
    fs::write(input.path().join("broken.json"), b"{ not json")?;
    fs::write(input.path().join("notes.txt"), b"ignored")?;

    let locations = discover_local_items(input.path(), None).await?;
    assert_eq!(locations.len(), 4);
    assert!(locations.iter().all(|l| l.item_url.starts_with("file://")));

    let config = PipelineConfig::new(output.path()).with_kinds(vec![OutputKind::Map]);
    let run = process_provider(&LocalFileFetcher, Provider::Capella, &locations, &config).await?;
    let report = run.kinds[0].report;
    assert_eq!(report.total, 4);
    assert_eq!(report.unavailable, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.normalized, 1);
    assert_eq!(run.rows_written(), 1);
    Ok(())
}

/// A provider with no usable item writes nothing
#[tokio::test]
async fn test_no_output_when_nothing_normalizes() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    write_item(
        input.path(),
        "empty.json",
        &json!({"id": "nogeo", "properties": {}}),
    );

    let locations = discover_local_items(input.path(), None).await?;
    let config = PipelineConfig::new(output.path().join("out"));
    let run = process_provider(&LocalFileFetcher, Provider::Iceye, &locations, &config).await?;

    for kind in &run.kinds {
        assert!(matches!(kind.outcome, ProviderOutcome::NoOutput));
        assert!(kind.written.is_empty());
    }
    assert!(!output.path().join("out").exists());
    Ok(())
}

/// Columns mixing sequences with scalars are written as JSON text
#[tokio::test]
async fn test_mixed_columns_are_encoded() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    let mut first = capella_item("first", Some("GEO"));
    first["properties"]["look_angle"] = json!([30.5, 31.0]);
    let mut second = capella_item("second", Some("GEO"));
    second["properties"]["look_angle"] = json!(30.5);
    write_item(input.path(), "first.json", &first);
    write_item(input.path(), "second.json", &second);

    let locations = discover_local_items(input.path(), None).await?;
    let config = PipelineConfig::new(output.path()).with_kinds(vec![OutputKind::Map]);
    let run = process_provider(&LocalFileFetcher, Provider::Capella, &locations, &config).await?;

    let ProviderOutcome::Produced(produced) = &run.kinds[0].outcome else {
        panic!("expected output");
    };
    assert!(produced.encoded_columns.iter().any(|c| c == "look_angle"));
    assert!(produced.schema.field_with_name("look_angle").is_ok());

    let features = read_features(&output.path().join("capella/capella_GEO.geojson"));
    assert_eq!(features[0]["properties"]["look_angle"], "[30.5,31.0]");
    assert_eq!(features[1]["properties"]["look_angle"], 30.5);
    Ok(())
}
