//! Integration tests for WeatherQuery using wiremock.
//!
//! These tests verify the on-demand query path against a mock provider.

use std::time::Duration;

use chrono::NaiveDate;
use meteotrack_weather::{
    HourlyOutcome, ReportField, WeatherError, WeatherProvider, WeatherQuery,
};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
}

/// Helper to build a provider body for one day of hourly samples.
fn forecast_body(fields: &[(&str, Vec<serde_json::Value>)]) -> serde_json::Value {
    let time: Vec<String> = (0..24).map(|h| format!("2025-01-14T{:02}:00", h)).collect();
    let mut hourly = serde_json::Map::new();
    hourly.insert("time".to_string(), serde_json::json!(time));
    for (name, values) in fields {
        hourly.insert(name.to_string(), serde_json::json!(values));
    }

    serde_json::json!({
        "current_weather": {
            "time": "2025-01-14T15:00",
            "temperature": 4.5,
            "windspeed": 12.0
        },
        "hourly": hourly
    })
}

fn ramp(offset: f64) -> Vec<serde_json::Value> {
    (0..24).map(|h| serde_json::json!(offset + h as f64)).collect()
}

async fn query_for(mock_server: &MockServer) -> WeatherQuery {
    let provider = WeatherProvider::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
    WeatherQuery::new(provider)
}

#[tokio::test]
async fn test_current_conditions_uses_pressure_at_current_hour() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("hourly", "pressure_msl"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(forecast_body(&[("pressure_msl", ramp(1000.0))])),
        )
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let now = date().and_hms_opt(15, 40, 0).unwrap();
    let conditions = query.current_conditions_at(55.75, 37.62, now).await.unwrap();

    assert_eq!(conditions.temperature, Some(4.5));
    assert_eq!(conditions.wind_speed, Some(12.0));
    assert_eq!(conditions.atmospheric_pressure, Some(1015.0));
    assert_eq!(conditions.observed_at.as_deref(), Some("2025-01-14T15:00"));
}

#[tokio::test]
async fn test_current_conditions_hour_missing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(forecast_body(&[("pressure_msl", ramp(1000.0))])),
        )
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let tomorrow = NaiveDate::from_ymd_opt(2025, 1, 15)
        .unwrap()
        .and_hms_opt(1, 0, 0)
        .unwrap();
    let err = query
        .current_conditions_at(55.75, 37.62, tomorrow)
        .await
        .unwrap_err();

    match err {
        WeatherError::NotFound { target } => assert_eq!(target, "2025-01-15T01"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_conditions_at_hour_returns_requested_fields_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("hourly", "temperature_2m,precipitation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(&[
            ("temperature_2m", ramp(-5.0)),
            ("precipitation", ramp(0.0)),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let outcome = query
        .conditions_at_hour_on(
            55.75,
            37.62,
            date(),
            "09:30",
            &[ReportField::Precipitation, ReportField::Temperature],
        )
        .await
        .unwrap();

    let values = match outcome {
        HourlyOutcome::Values(values) => values,
        other => panic!("expected values, got {other:?}"),
    };
    assert_eq!(values.len(), 2);
    assert_eq!(values[&ReportField::Temperature], Some(4.0));
    assert_eq!(values[&ReportField::Precipitation], Some(9.0));
    assert!(!values.contains_key(&ReportField::Humidity));
}

#[tokio::test]
async fn test_conditions_at_hour_null_sample_is_none() {
    let mock_server = MockServer::start().await;

    let mut humidity = ramp(50.0);
    humidity[12] = serde_json::Value::Null;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body(&[("relative_humidity_2m", humidity)])),
        )
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let outcome = query
        .conditions_at_hour_on(55.75, 37.62, date(), "12", &[ReportField::Humidity])
        .await
        .unwrap();

    let values = match outcome {
        HourlyOutcome::Values(values) => values,
        other => panic!("expected values, got {other:?}"),
    };
    assert_eq!(values.get(&ReportField::Humidity), Some(&None));
}

#[tokio::test]
async fn test_conditions_at_hour_without_fields_is_marker() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(&[])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let outcome = query
        .conditions_at_hour_on(55.75, 37.62, date(), "10", &[])
        .await
        .unwrap();

    assert_eq!(outcome, HourlyOutcome::NoParametersRequested);
}

#[tokio::test]
async fn test_conditions_at_hour_rejects_bad_hour_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body(&[])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    for hour in ["24", "7", "xx", "15:zz"] {
        let err = query
            .conditions_at_hour_on(55.75, 37.62, date(), hour, &[ReportField::Temperature])
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::InvalidHour(_)), "hour {hour}");
    }
}

#[tokio::test]
async fn test_conditions_at_hour_not_found_is_typed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(forecast_body(&[("temperature_2m", ramp(0.0))])),
        )
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let other_day = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    let err = query
        .conditions_at_hour_on(55.75, 37.62, other_day, "10", &[ReportField::Temperature])
        .await
        .unwrap_err();

    assert!(matches!(err, WeatherError::NotFound { .. }));
}

#[tokio::test]
async fn test_conditions_at_hour_propagates_provider_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let query = query_for(&mock_server).await;
    let err = query
        .conditions_at_hour_on(55.75, 37.62, date(), "10", &[ReportField::WindSpeed])
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(err.to_string().contains("500"), "error should mention status: {err}");
}
