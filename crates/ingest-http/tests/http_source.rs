// SPDX-License-Identifier: MIT OR Apache-2.0
use futures::StreamExt;
use ingest_http::{HttpDataSource, HttpSourceConfig};
use ingest_source_core::DataSource;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(value: serde_json::Value) -> HttpSourceConfig {
    let mut value = value;
    value["min_interval_seconds"] = json!(0.0);
    value["base_backoff_seconds"] = json!(0.001);
    value["max_backoff_seconds"] = json!(0.002);
    value["jitter"] = json!(false);
    HttpSourceConfig::from_value(&value).unwrap()
}

#[tokio::test]
async fn paginated_source_stops_on_short_last_page() {
    let server = MockServer::start().await;

    let page = |rows: usize| {
        let values: Vec<_> = (0..rows).map(|i| json!({"id": i})).collect();
        json!({"Value": values})
    };

    Mock::given(method("GET"))
        .and(path("/PV/Bus"))
        .and(query_param("$skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/PV/Bus"))
        .and(query_param("$skip", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/PV/Bus"))
        .and(query_param("$skip", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(47)))
        .mount(&server)
        .await;

    let config = fast_config(json!({
        "dataset": "pv_bus",
        "path": "/PV/Bus",
        "endpoints": [server.uri()],
        "mode": {"mode": "paginated", "page_size": 500, "rows_field": "Value"},
    }));
    let source = HttpDataSource::new(config).unwrap();

    let records: Vec<_> = source.fetch().collect::<Vec<_>>().await;
    assert_eq!(records.len(), 3);
    let total_rows: u64 = records
        .iter()
        .map(|r| r.as_ref().unwrap().meta.meta.get("row_count").unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(total_rows, 1047);
}

#[tokio::test]
async fn scenario_source_records_retry_count_in_provenance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scenario"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/scenario"))
        .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
        .mount(&server)
        .await;

    let config = fast_config(json!({
        "dataset": "scenario_ds",
        "path": "/scenario",
        "endpoints": [server.uri()],
        "max_retries": 3,
        "mode": {"mode": "scenario"},
    }));
    let source = HttpDataSource::new(config).unwrap();

    let records: Vec<_> = source.fetch().collect::<Vec<_>>().await;
    assert_eq!(records.len(), 1);
    let record = records.into_iter().next().unwrap().unwrap();
    assert_eq!(record.meta.meta.get("retries").unwrap(), "2");
    assert_eq!(record.payload, b"payload");
}

#[tokio::test]
async fn link_file_source_extracts_zip_entries() {
    let server = MockServer::start().await;

    let zip_bytes = {
        use std::io::{Cursor, Write};
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("a.csv", options).unwrap();
            writer.write_all(b"a,b,c").unwrap();
            writer.start_file("b.csv", options).unwrap();
            writer.write_all(b"d,e,f").unwrap();
            writer.finish().unwrap();
        }
        buf
    };

    Mock::given(method("GET"))
        .and(path("/GeospatialWholeIsland"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Link": format!("{}/download", server.uri())})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes))
        .mount(&server)
        .await;

    let config = fast_config(json!({
        "dataset": "geospatial_whole_island",
        "path": "/GeospatialWholeIsland",
        "endpoints": [server.uri()],
        "mode": {"mode": "link_file", "max_bytes": 0},
    }));
    let source = HttpDataSource::new(config).unwrap();

    let records: Vec<_> = source.fetch().collect::<Vec<_>>().await;
    assert_eq!(records.len(), 2);
    let names: Vec<_> = records
        .iter()
        .map(|r| r.as_ref().unwrap().meta.meta.get("inner_file").unwrap().clone())
        .collect();
    assert!(names.contains(&"a.csv".to_string()));
    assert!(names.contains(&"b.csv".to_string()));
    for record in &records {
        assert_eq!(record.as_ref().unwrap().meta.meta.get("is_zip").unwrap(), "1");
    }
}

#[tokio::test]
async fn link_file_source_rejects_zip_slip_entry() {
    let server = MockServer::start().await;

    let zip_bytes = {
        use std::io::{Cursor, Write};
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file("../evil.txt", options).unwrap();
            writer.write_all(b"pwned").unwrap();
            writer.finish().unwrap();
        }
        buf
    };

    Mock::given(method("GET"))
        .and(path("/TrafficFlow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Link": format!("{}/download", server.uri())})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes))
        .mount(&server)
        .await;

    let config = fast_config(json!({
        "dataset": "trafficflow",
        "path": "/TrafficFlow",
        "endpoints": [server.uri()],
        "mode": {"mode": "link_file", "max_bytes": 0},
    }));
    let source = HttpDataSource::new(config).unwrap();

    let records: Vec<_> = source.fetch().collect::<Vec<_>>().await;
    assert_eq!(records.len(), 1);
    let err = records.into_iter().next().unwrap().unwrap_err();
    assert_eq!(err.code, ingest_error::ErrorCode::SourceZipSlip);
}
