//! Tests for the weather API router.
//!
//! Each test builds the router over an in-memory store with every provider
//! endpoint pointed at a mock server, then drives it with `oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, DurationRound, Utc};
use httpmock::prelude::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use sources::SourcesConfig;
use storage::WeatherStore;
use test_utils::{
    assert_approx_eq, coords, geocoding_payload, observation, open_meteo_payload, yr_payload,
    YrEntry,
};
use weather_api::{build_router, config::ServiceConfig, state::AppState};
use weather_common::WeatherSource;

const YR_PATH: &str = "/weatherapi/locationforecast/2.0/compact";
const OPEN_METEO_PATH: &str = "/v1/forecast";

struct TestApp {
    router: Router,
    store: Arc<WeatherStore>,
}

async fn test_app(server: &MockServer) -> TestApp {
    let store = Arc::new(WeatherStore::open_memory().await.unwrap());
    let config = ServiceConfig {
        sources: SourcesConfig::with_base_url(&server.base_url()),
        ..ServiceConfig::default()
    };
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState::with_store(&config, Arc::clone(&store), handle).unwrap();

    TestApp {
        router: build_router(Arc::new(state)),
        store,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Provider bodies covering the current UTC hour.
fn current_hour_bodies() -> (Value, Value) {
    let hour = Utc::now().duration_trunc(Duration::hours(1)).unwrap();
    let yr_time = hour.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let om_time = hour.format("%Y-%m-%dT%H:%M").to_string();

    (
        yr_payload(&[YrEntry::new(&yr_time, Some(10.0), Some(0.5))]),
        open_meteo_payload(&[&om_time], &[Some(20.0)], &[Some(0.0)]),
    )
}

// ============================================================================
// Operational endpoints
// ============================================================================

#[tokio::test]
async fn test_health() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "weather-api");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Current weather
// ============================================================================

#[tokio::test]
async fn test_current_runs_pipeline_once_then_serves_from_store() {
    let server = MockServer::start_async().await;
    let (yr_body, om_body) = current_hour_bodies();
    let yr_mock = server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(om_body);
        })
        .await;

    let app = test_app(&server).await;
    let uri = "/api/v1/weather/current?lat=59.91&lon=10.75";

    let (status, body) = get(&app.router, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_approx_eq!(body["average_temperature"].as_f64().unwrap(), 15.0, 1e-9);
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);
    assert_approx_eq!(
        body["consensus"]["weighted_temperature"].as_f64().unwrap(),
        14.0,
        1e-9
    );
    assert_eq!(body["consensus"]["source_count"], 2);

    let (status, _) = get(&app.router, uri).await;
    assert_eq!(status, StatusCode::OK);
    yr_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_current_source_down_is_503() {
    let server = MockServer::start_async().await;
    let (yr_body, _) = current_hour_bodies();
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(500);
        })
        .await;

    let app = test_app(&server).await;
    let (status, body) = get(&app.router, "/api/v1/weather/current?lat=59.91&lon=10.75").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "SourceUnavailable");
    assert_eq!(app.store.count_observations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_current_without_data_is_404() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_payload(&[]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_payload(&[], &[], &[]));
        })
        .await;

    let app = test_app(&server).await;
    let (status, body) = get(&app.router, "/api/v1/weather/current?lat=59.91&lon=10.75").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "DataNotAvailable");
}

#[tokio::test]
async fn test_current_rejects_out_of_range_coordinates() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, body) = get(&app.router, "/api/v1/weather/current?lat=95&lon=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParameter");
}

// ============================================================================
// Aggregates
// ============================================================================

#[tokio::test]
async fn test_daily_average_by_location_name() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;
    app.store
        .load(&[
            observation(WeatherSource::YrNo, 1, 2.0),
            observation(WeatherSource::OpenMeteo, 2, 4.0),
        ])
        .await
        .unwrap();

    let (status, body) = get(&app.router, "/api/v1/weather/daily-average?location=Oslo").await;

    assert_eq!(status, StatusCode::OK);
    let days = body.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], "2026-01-12");
    assert_approx_eq!(days[0]["average_temperature"].as_f64().unwrap(), 3.0, 1e-9);
}

#[tokio::test]
async fn test_daily_average_requires_location() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, _) = get(&app.router, "/api/v1/weather/daily-average?lat=59.91").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app.router, "/api/v1/weather/daily-average?location=narnia").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UnknownLocation");
}

#[tokio::test]
async fn test_source_deviation() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;
    app.store
        .load(&[
            observation(WeatherSource::YrNo, 1, 2.0),
            observation(WeatherSource::YrNo, 2, 4.0),
            observation(WeatherSource::OpenMeteo, 1, 6.5),
        ])
        .await
        .unwrap();

    let (lat, lon) = coords::OSLO;
    let uri = format!(
        "/api/v1/weather/source-deviation?date=2026-01-12&lat={}&lon={}",
        lat, lon
    );
    let (status, body) = get(&app.router, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_averages"]["yr"], 3.0);
    assert_eq!(body["source_averages"]["open-meteo"], 6.5);
    assert_approx_eq!(body["deviation_yr_vs_openmeteo"].as_f64().unwrap(), 3.5, 1e-9);
}

#[tokio::test]
async fn test_source_deviation_single_source_has_no_deviation() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;
    app.store
        .load(&[observation(WeatherSource::YrNo, 1, 2.0)])
        .await
        .unwrap();

    let (status, body) = get(
        &app.router,
        "/api/v1/weather/source-deviation?date=2026-01-12&location=oslo",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["deviation_yr_vs_openmeteo"].is_null());
}

#[tokio::test]
async fn test_source_deviation_bad_date() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, body) = get(
        &app.router,
        "/api/v1/weather/source-deviation?date=12/01/2026&location=oslo",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParameter");
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_returns_candidates() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/search").query_param("name", "Bergen");
            then.status(200).json_body(geocoding_payload(&[(
                "Bergen",
                60.39,
                5.32,
                Some("Norway"),
                Some("Vestland"),
            )]));
        })
        .await;

    let app = test_app(&server).await;
    let (status, body) = get(&app.router, "/api/v1/weather/search?name=Bergen").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Bergen");
    assert_eq!(body[0]["country"], "Norway");
    assert_eq!(body[0]["region"], "Vestland");
}

#[tokio::test]
async fn test_search_rejects_short_name() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, body) = get(&app.router, "/api/v1/weather/search?name=B").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParameter");
}

// ============================================================================
// Pipeline trigger
// ============================================================================

#[tokio::test]
async fn test_trigger_by_location_then_read_consensus() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_payload(&[
                YrEntry::new("2026-01-12T12:00:00Z", Some(10.0), None),
                YrEntry::new("2026-01-12T13:00:00Z", Some(12.0), None),
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_payload(
                &["2026-01-12T12:00"],
                &[Some(20.0)],
                &[Some(0.0)],
            ));
        })
        .await;

    let app = test_app(&server).await;
    let (status, report) =
        post_json(&app.router, "/api/v1/pipeline/run", json!({ "location": "oslo" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["observations_loaded"], 3);
    assert_eq!(report["consensus"].as_array().unwrap().len(), 2);

    let (status, series) = get(
        &app.router,
        "/api/v1/weather/consensus?location=oslo&since=2026-01-12T13:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let series = series.as_array().unwrap();
    assert_eq!(series.len(), 1);
    assert_approx_eq!(series[0]["weighted_temperature"].as_f64().unwrap(), 12.0, 1e-9);
    assert_eq!(series[0]["source_count"], 1);
}

#[tokio::test]
async fn test_trigger_requires_coordinates_or_location() {
    let server = MockServer::start_async().await;
    let app = test_app(&server).await;

    let (status, body) = post_json(&app.router, "/api/v1/pipeline/run", json!({ "lat": 1.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidParameter");
}
