//! End-to-end pipeline tests against a mock provider server and an
//! in-memory store.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use etl::{EtlPipeline, SourceWeights};
use sources::SourcesConfig;
use storage::WeatherStore;
use test_utils::{
    assert_approx_eq, coords, hour, observation, open_meteo_payload, yr_payload, YrEntry,
};
use weather_common::{EtlError, WeatherSource};

const YR_PATH: &str = "/weatherapi/locationforecast/2.0/compact";
const OPEN_METEO_PATH: &str = "/v1/forecast";

async fn pipeline_for(server: &MockServer) -> EtlPipeline {
    let store = Arc::new(WeatherStore::open_memory().await.unwrap());
    let config = SourcesConfig::with_base_url(&server.base_url());
    EtlPipeline::new(&config, store, SourceWeights::default()).unwrap()
}

fn yr_body() -> serde_json::Value {
    yr_payload(&[
        YrEntry::new("2026-01-12T12:00:00Z", Some(10.0), Some(0.2)),
        YrEntry::new("2026-01-12T13:00:00Z", Some(11.0), None),
        YrEntry::new("2026-01-12T14:00:00Z", None, None),
    ])
}

fn open_meteo_body() -> serde_json::Value {
    open_meteo_payload(
        &["2026-01-12T12:00", "2026-01-12T13:00"],
        &[Some(20.0), None],
        &[Some(0.0), Some(0.1)],
    )
}

#[tokio::test]
async fn test_full_run_loads_both_sources_and_consensus() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_body());
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let (lat, lon) = coords::OSLO;
    let report = pipeline.run(lat, lon).await.unwrap();

    assert_eq!(report.observations_loaded, 3);
    assert_eq!(report.sources.len(), 2);
    let yr = report
        .sources
        .iter()
        .find(|s| s.source == WeatherSource::YrNo)
        .unwrap();
    assert_eq!(yr.observations, 2);

    assert_eq!(report.consensus.len(), 2);
    assert_eq!(report.consensus[0].timestamp, hour(12));
    assert_approx_eq!(report.consensus[0].weighted_temperature, 14.0, 1e-9);
    assert_eq!(report.consensus[0].source_count, 2);
    assert_approx_eq!(report.consensus[1].weighted_temperature, 11.0, 1e-9);
    assert_eq!(report.consensus[1].source_count, 1);

    let store = pipeline.store();
    assert_eq!(store.count_observations().await.unwrap(), 3);
    assert_eq!(store.count_consensus().await.unwrap(), 2);
}

#[tokio::test]
async fn test_rerun_does_not_duplicate_rows() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_body());
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let (lat, lon) = coords::AWKWARD;

    let first = pipeline.run(lat, lon).await.unwrap();
    let second = pipeline.run(lat, lon).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(pipeline.store().count_observations().await.unwrap(), 3);
    assert_eq!(pipeline.store().count_consensus().await.unwrap(), 2);
}

#[tokio::test]
async fn test_one_source_down_fails_run_without_writes() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(502).body("bad gateway");
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let (lat, lon) = coords::OSLO;
    let err = pipeline.run(lat, lon).await.unwrap_err();

    match err {
        EtlError::SourceUnavailable { provider, .. } => assert_eq!(provider, "open-meteo"),
        other => panic!("Expected SourceUnavailable, got {:?}", other),
    }
    assert_eq!(pipeline.store().count_observations().await.unwrap(), 0);
    assert_eq!(pipeline.store().count_consensus().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_payload_only_drops_that_source() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(json!({
                "hourly": {
                    "time": ["2026-01-12T12:00", "2026-01-12T13:00"],
                    "temperature_2m": [1.0],
                    "precipitation": [0.0, 0.0]
                }
            }));
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let (lat, lon) = coords::OSLO;
    let report = pipeline.run(lat, lon).await.unwrap();

    assert_eq!(report.observations_loaded, 2);
    let open_meteo = report
        .sources
        .iter()
        .find(|s| s.source == WeatherSource::OpenMeteo)
        .unwrap();
    assert_eq!(open_meteo.observations, 0);

    // Consensus falls back to the remaining source's values
    assert_eq!(report.consensus.len(), 2);
    assert_approx_eq!(report.consensus[0].weighted_temperature, 10.0, 1e-9);
    assert_approx_eq!(report.consensus[1].weighted_temperature, 11.0, 1e-9);
    assert!(report.consensus.iter().all(|c| c.source_count == 1));
}

#[tokio::test]
async fn test_degraded_rerun_keeps_consensus_from_stored_rows() {
    let store = Arc::new(WeatherStore::open_memory().await.unwrap());
    let (lat, lon) = coords::OSLO;

    let healthy = MockServer::start_async().await;
    healthy
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    healthy
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_body());
        })
        .await;

    let degraded = MockServer::start_async().await;
    degraded
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_body());
        })
        .await;
    degraded
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(json!({
                "hourly": {
                    "time": ["2026-01-12T12:00", "2026-01-12T13:00"],
                    "temperature_2m": [1.0],
                    "precipitation": [0.0, 0.0]
                }
            }));
        })
        .await;

    let weights = SourceWeights::default();
    let first = EtlPipeline::new(
        &SourcesConfig::with_base_url(&healthy.base_url()),
        store.clone(),
        weights,
    )
    .unwrap();
    let second = EtlPipeline::new(
        &SourcesConfig::with_base_url(&degraded.base_url()),
        store.clone(),
        weights,
    )
    .unwrap();

    first.run(lat, lon).await.unwrap();
    let report = second.run(lat, lon).await.unwrap();

    // Open-Meteo's 12:00 row from the first run still counts
    assert_eq!(report.consensus[0].timestamp, hour(12));
    assert_approx_eq!(report.consensus[0].weighted_temperature, 14.0, 1e-9);
    assert_eq!(report.consensus[0].source_count, 2);

    let stored = store.consensus_series(lat, lon, None).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_approx_eq!(stored[0].weighted_temperature, 14.0, 1e-9);
    assert_eq!(stored[0].source_count, 2);
    assert_approx_eq!(stored[1].weighted_temperature, 11.0, 1e-9);
    assert_eq!(stored[1].source_count, 1);
    assert_eq!(store.count_observations().await.unwrap(), 3);
}

#[tokio::test]
async fn test_consensus_ignores_stored_rows_outside_run() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(YR_PATH);
            then.status(200).json_body(yr_payload(&[
                YrEntry::new("2026-01-12T12:00:00Z", Some(10.0), None),
                YrEntry::new("2026-01-12T14:00:00Z", Some(12.0), None),
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(OPEN_METEO_PATH);
            then.status(200).json_body(open_meteo_payload(&[], &[], &[]));
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let (lat, lon) = coords::OSLO;

    // Stored between the run's timestamps, but not written by the run
    pipeline
        .store()
        .load(&[observation(WeatherSource::OpenMeteo, 13, 5.0)])
        .await
        .unwrap();

    let report = pipeline.run(lat, lon).await.unwrap();

    assert_eq!(report.consensus.len(), 2);
    assert_eq!(report.consensus[0].timestamp, hour(12));
    assert_eq!(report.consensus[1].timestamp, hour(14));
    assert_eq!(pipeline.store().count_consensus().await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalid_coordinates_rejected_before_fetch() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({}));
        })
        .await;

    let pipeline = pipeline_for(&server).await;
    let err = pipeline.run(91.0, 0.0).await.unwrap_err();

    assert!(matches!(err, EtlError::InvalidParameter { .. }));
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_run_for_unknown_location() {
    let server = MockServer::start_async().await;
    let pipeline = pipeline_for(&server).await;

    let err = pipeline.run_for_location("atlantis").await.unwrap_err();
    assert!(matches!(err, EtlError::UnknownLocation(_)));
}
