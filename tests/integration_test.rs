//! Integration tests for the synoptic server
//!
//! A small CFSR-like archive and an EFI file are written to a temp
//! directory, then every route is driven through the router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use common::assertions::{assert_api_error, assert_in_range, body_bytes, body_json};
use common::image_utils::{assert_chart_dimensions, decode_png, painted_fraction};
use common::test_data::{write_cfsr_archive, write_efi_archive};
use synoptic::gallery::reanalysis_panels;
use synoptic::handlers::{response::TITLE_HEADER, router};
use synoptic::loader::{DirectorySource, FieldLoader};
use synoptic::{AppState, BoundingBox, Config};

const MAP_WIDTH: u32 = 300;
const MAP_HEIGHT: u32 = 240;
const TIME: &str = "2016071912";
const REGION: &str = "70,140,10,65";

fn valid_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2016, 7, 19)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

/// Archive roots and the router over them
struct TestServer {
    _dir: TempDir,
    app: Router,
    state: Arc<AppState>,
}

fn server_with(skip_codes: &[&str], with_efi: bool) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let cfsr = dir.path().join("cfsr");
    let efi = dir.path().join("efi");
    write_cfsr_archive(&cfsr, valid_time(), skip_codes).unwrap();
    if with_efi {
        write_efi_archive(&efi, "2020093000", "tpi", true).unwrap();
    }

    let mut config = Config::default();
    config.loader.archive_dir = Some(cfsr);
    config.efi.data_dir = efi;
    config.efi.temp_dir = dir.path().join("staging");
    config.render.width = MAP_WIDTH;
    config.render.height = MAP_HEIGHT;
    config.validate().unwrap();

    let state = Arc::new(AppState::from_config(config).unwrap());
    TestServer {
        _dir: dir,
        app: router(Arc::clone(&state)),
        state,
    }
}

fn server() -> TestServer {
    server_with(&[], true)
}

async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_archive_loads_every_field_in_display_units() {
    let dir = tempfile::tempdir().unwrap();
    write_cfsr_archive(dir.path(), valid_time(), &[]).unwrap();

    let loader = FieldLoader::new(Arc::new(DirectorySource::new(dir.path())), Duration::from_secs(60));
    let bbox = BoundingBox::parse(REGION).unwrap();
    let fields = loader.load(valid_time(), &bbox).await.unwrap();

    assert_eq!(fields.len(), 24);
    let t850 = fields.get("t850").unwrap();
    assert_eq!(t850.units(), "degC");
    let (lo, hi) = t850.finite_range().unwrap();
    assert_in_range(lo, -20.0, 40.0);
    assert_in_range(hi, -20.0, 40.0);

    let mslp = fields.get("mslp").unwrap();
    assert_eq!(mslp.units(), "hPa");
    let (lo, hi) = mslp.finite_range().unwrap();
    assert_in_range(lo, 990.0, 1030.0);
    assert_in_range(hi, 990.0, 1030.0);

    assert_eq!(fields.get("pwat").unwrap().units(), "mm");
    assert!(fields.get("pres_pv2").is_some());

    // archive latitudes run north to south; fields run south to north
    let lat = t850.lat();
    assert!(lat.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(lat.first().copied(), Some(10.0));
    assert_eq!(lat.last().copied(), Some(65.0));
}

#[tokio::test]
async fn test_gallery_renders_every_panel_in_order() {
    let server = server();
    let uri = format!("/reanalysis/gallery?time={}&region={}&format=json", TIME, REGION);
    let response = get(&server.app, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 18);
    assert!(body["missing"].as_array().unwrap().is_empty());

    let labels: Vec<&str> = images.iter().map(|i| i["label"].as_str().unwrap()).collect();
    let expected: Vec<String> = reanalysis_panels().into_iter().map(|p| p.label).collect();
    assert_eq!(labels, expected.iter().map(String::as_str).collect::<Vec<_>>());

    assert_eq!(
        images[2]["title"].as_str(),
        Some("CFSR | 500hPa GH | T | 2016-07-19 12UTC")
    );
    let png = STANDARD.decode(images[0]["png_base64"].as_str().unwrap()).unwrap();
    let chart = decode_png(&png);
    assert_chart_dimensions(&chart, MAP_WIDTH, MAP_HEIGHT);
    assert!(painted_fraction(&chart, MAP_WIDTH) > 0.5);

    let stats = server.state.stats.snapshot();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.panels_rendered, 18);
}

#[tokio::test]
async fn test_gallery_html_and_filter() {
    let server = server();
    let uri = format!(
        "/reanalysis/gallery?time={}&region=north_china&panels=Mean_Sea_Level_Pressure,500hPa_Height",
        TIME
    );
    let response = get(&server.app, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let page = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(page.matches("<figure").count(), 2);
    // declaration order, not filter order
    assert!(page.find("500hPa_Height").unwrap() < page.find("Mean_Sea_Level_Pressure").unwrap());
}

#[tokio::test]
async fn test_gallery_skips_panels_without_inputs() {
    let server = server_with(&["pwat"], false);
    let uri = format!("/reanalysis/gallery?time={}&region={}&format=json", TIME, REGION);
    let body = body_json(get(&server.app, &uri).await).await;

    assert_eq!(body["images"].as_array().unwrap().len(), 17);
    let missing = body["missing"].as_array().unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0]["label"], "Precipitable_Water");
    assert_eq!(missing[0]["reason"], "missing field pwat");

    // the composite cannot degrade
    let uri = format!("/reanalysis/composite?time={}&region={}", TIME, REGION);
    assert_api_error(get(&server.app, &uri).await, StatusCode::SERVICE_UNAVAILABLE, "pwat").await;
}

#[tokio::test]
async fn test_composite_and_single_panel_are_png() {
    let server = server();

    let uri = format!("/reanalysis/composite?time={}&region={}", TIME, REGION);
    let response = get(&server.app, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[TITLE_HEADER],
        "Synoptic Composite  Valid: 2016-07-19 1200 UTC"
    );
    assert_chart_dimensions(&decode_png(&body_bytes(response).await), MAP_WIDTH, MAP_HEIGHT);

    let uri = format!(
        "/reanalysis/panel?time={}&region={}&name=Mean_Sea_Level_Pressure",
        TIME, REGION
    );
    let response = get(&server.app, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[TITLE_HEADER],
        "CFSR | MSLP | 500hPa GH | 2016-07-19 12UTC"
    );
    decode_png(&body_bytes(response).await);
}

#[tokio::test]
async fn test_concurrent_renders_are_serialised() {
    let server = server();
    let uri = format!("/reanalysis/panel?time={}&region={}&name=850hPa_Wind", TIME, REGION);

    let (a, b) = tokio::join!(get(&server.app, &uri), get(&server.app, &uri));
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(body_bytes(a).await, body_bytes(b).await);
    assert!(!server.state.reanalysis.is_rendering());
    assert_eq!(server.state.stats.snapshot().completed, 2);
}

#[tokio::test]
async fn test_errors_map_to_status_codes() {
    let server = server();
    let app = &server.app;

    let uri = format!("/reanalysis/gallery?time=2016071907&region={}", REGION);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "Invalid time").await;

    let uri = format!("/reanalysis/gallery?time={}&region=140,70,10,65", TIME);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "Invalid region").await;

    let uri = format!("/reanalysis/gallery?region={}", REGION);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "time is required").await;

    let uri = format!("/reanalysis/gallery?time={}&format=pdf", TIME);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "Unsupported format").await;

    let uri = format!("/reanalysis/gallery?time={}&panels=Nope", TIME);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "Unknown panel").await;

    let uri = format!("/reanalysis/panel?time={}&name=Nope", TIME);
    assert_api_error(get(app, &uri).await, StatusCode::BAD_REQUEST, "Unknown panel").await;

    // no archive for 2015
    let uri = format!("/reanalysis/composite?time=2015071912&region={}", REGION);
    assert_api_error(get(app, &uri).await, StatusCode::SERVICE_UNAVAILABLE, "Data unavailable").await;

    // still serving after failures
    let response = get(app, "/heartbeat").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["renders"]["failed"], 1);
}

#[tokio::test]
async fn test_efi_routes() {
    let server = server();
    let app = &server.app;

    let variables = body_json(get(app, "/efi/variables").await).await;
    assert_eq!(variables.as_array().unwrap().len(), 9);
    assert_eq!(variables[0]["short_name"], "tpi");

    let init_times = body_json(get(app, "/efi/init_times").await).await;
    assert_eq!(init_times["init_times"], serde_json::json!(["2020093000"]));

    // newest run when init is omitted
    let response = get(app, "/efi/gallery?variable=tpi&region=60,160,0,60&format=json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let labels: Vec<&str> = body["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["0-24", "24-48", "48-72"]);
    let title = body["images"][1]["title"].as_str().unwrap();
    assert!(title.starts_with("ECMWF | Extreme forecast index"));
    assert!(title.ends_with("T+24-48h | 2020-09-30 00UTC"));

    let response = get(app, "/efi/gallery?init=2020093000&region=east_asia").await;
    assert_api_error(response, StatusCode::BAD_REQUEST, "variable").await;

    let response = get(app, "/efi/gallery?init=2020093000&variable=rain").await;
    assert_api_error(response, StatusCode::BAD_REQUEST, "Unknown EFI variable").await;

    let response = get(app, "/efi/gallery?init=2020092912&variable=tpi").await;
    assert_api_error(response, StatusCode::SERVICE_UNAVAILABLE, "efi").await;
}

#[tokio::test]
async fn test_efi_gallery_without_archive() {
    let server = server_with(&[], false);
    let response = get(&server.app, "/efi/gallery?variable=tpi").await;
    assert_api_error(response, StatusCode::SERVICE_UNAVAILABLE, "no initialisation times").await;

    let init_times = body_json(get(&server.app, "/efi/init_times").await).await;
    assert_eq!(init_times["init_times"], serde_json::json!([]));
}

#[tokio::test]
async fn test_index_regions_and_heartbeat() {
    let server = server();
    let app = &server.app;

    let response = get(app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(page.contains("<form"));

    let china = body_json(get(app, "/regions").await).await;
    assert_eq!(china[0]["name"], "china");
    assert_eq!(china[0]["bbox"], serde_json::json!([70.0, 140.0, 8.0, 60.0]));

    let global = body_json(get(app, "/regions?scope=global").await).await;
    assert_eq!(global.as_array().unwrap().len(), 10);

    assert_api_error(get(app, "/regions?scope=mars").await, StatusCode::BAD_REQUEST, "scope").await;

    let heartbeat = body_json(get(app, "/heartbeat").await).await;
    assert_eq!(heartbeat["sources"][0], "directory");
    assert_eq!(heartbeat["rendering"], false);
    assert_eq!(heartbeat["renders"]["completed"], 0);
}
