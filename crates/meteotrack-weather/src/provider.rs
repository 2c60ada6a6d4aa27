//! Open-Meteo forecast client.
//!
//! One-shot fetch of `current_weather` plus the requested hourly arrays.
//! No retries and no caching: callers decide what to do on failure.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{
    ConditionsPayload, CurrentWeather, DataShapeError, HourlyField, HourlySeries, ProviderError,
    WeatherError,
};

pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeatherBlock>,
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherBlock {
    temperature: f64,
    windspeed: f64,
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Option<Vec<String>>,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
}

impl WeatherProvider {
    /// Provider against the public Open-Meteo endpoint.
    pub fn open_meteo() -> Result<Self, WeatherError> {
        Self::new(
            OPEN_METEO_FORECAST_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch current conditions and the given hourly fields for a point.
    ///
    /// Every returned hourly array has exactly as many samples as `hourly.time`;
    /// anything else is reported as [`DataShapeError`].
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        fields: &[HourlyField],
    ) -> Result<ConditionsPayload, WeatherError> {
        validate_coordinates(latitude, longitude)?;

        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("hourly", HourlyField::join(fields)),
            ("timezone", "auto".to_string()),
        ];

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(ProviderError::Network)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::Network)?;

        if !status.is_success() {
            tracing::debug!("Provider returned status {}", status);
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        parse_payload(&body, fields)
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), WeatherError> {
    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Ok(())
    } else {
        Err(WeatherError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

/// Parse a provider body into an index-aligned payload.
pub(crate) fn parse_payload(
    body: &str,
    fields: &[HourlyField],
) -> Result<ConditionsPayload, WeatherError> {
    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let current = response
        .current_weather
        .ok_or(DataShapeError::MissingSection("current_weather"))?;

    let hourly = match response.hourly {
        Some(block) => align_hourly(block, fields)?,
        None if fields.is_empty() => HourlySeries::default(),
        None => return Err(DataShapeError::MissingSection("hourly").into()),
    };

    Ok(ConditionsPayload {
        current: CurrentWeather {
            temperature: current.temperature,
            wind_speed: current.windspeed,
            observed_at: current.time,
        },
        hourly,
    })
}

fn align_hourly(
    mut block: HourlyBlock,
    fields: &[HourlyField],
) -> Result<HourlySeries, DataShapeError> {
    let time = block.time.ok_or(DataShapeError::MissingField("time"))?;
    let mut values = BTreeMap::new();

    for field in fields {
        let name = field.api_name();
        let raw = block
            .fields
            .remove(name)
            .ok_or(DataShapeError::MissingField(name))?;

        let samples: Vec<Option<f64>> =
            serde_json::from_value(raw).map_err(|e| DataShapeError::InvalidValues {
                field: name,
                message: e.to_string(),
            })?;

        if samples.len() != time.len() {
            return Err(DataShapeError::LengthMismatch {
                field: name,
                expected: time.len(),
                actual: samples.len(),
            });
        }

        values.insert(*field, samples);
    }

    Ok(HourlySeries { time, values })
}
