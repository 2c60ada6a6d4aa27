use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Hourly variables the provider can return alongside `hourly.time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourlyField {
    PressureMsl,
    Temperature2m,
    RelativeHumidity2m,
    WindSpeed10m,
    Precipitation,
}

impl HourlyField {
    /// Name used in the provider's `hourly=` query parameter and response keys.
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::PressureMsl => "pressure_msl",
            Self::Temperature2m => "temperature_2m",
            Self::RelativeHumidity2m => "relative_humidity_2m",
            Self::WindSpeed10m => "wind_speed_10m",
            Self::Precipitation => "precipitation",
        }
    }

    /// Comma-separated list for the `hourly=` query parameter.
    pub fn join(fields: &[HourlyField]) -> String {
        fields
            .iter()
            .map(HourlyField::api_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Fields a caller may ask for in an at-hour query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    Temperature,
    Humidity,
    WindSpeed,
    Precipitation,
}

impl ReportField {
    pub fn hourly_field(&self) -> HourlyField {
        match self {
            Self::Temperature => HourlyField::Temperature2m,
            Self::Humidity => HourlyField::RelativeHumidity2m,
            Self::WindSpeed => HourlyField::WindSpeed10m,
            Self::Precipitation => HourlyField::Precipitation,
        }
    }
}

/// `current_weather` block of a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub wind_speed: f64,
    /// Observation time reported by the provider (local time, `YYYY-MM-DDTHH:MM`).
    pub observed_at: Option<String>,
}

/// Index-aligned hourly arrays. Every entry of `values` has the same length as `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub values: BTreeMap<HourlyField, Vec<Option<f64>>>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Sample of `field` at `index`. `None` when the field was not requested,
    /// the index is out of range, or the provider returned null.
    pub fn value_at(&self, field: HourlyField, index: usize) -> Option<f64> {
        self.values
            .get(&field)
            .and_then(|samples| samples.get(index))
            .copied()
            .flatten()
    }
}

/// Result of a single provider fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsPayload {
    pub current: CurrentWeather,
    pub hourly: HourlySeries,
}

/// Current conditions for a point, with pressure taken from the hourly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub atmospheric_pressure: Option<f64>,
    pub observed_at: Option<String>,
}

/// Outcome of an at-hour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourlyOutcome {
    /// The caller asked for no fields at all.
    NoParametersRequested,
    /// Requested fields at the matched hour. Null samples are `None`.
    Values(BTreeMap<ReportField, Option<f64>>),
}

/// Failures talking to the provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// The response parsed as JSON but does not have the expected layout.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DataShapeError {
    #[error("Response is missing the `{0}` section")]
    MissingSection(&'static str),
    #[error("Hourly data is missing field `{0}`")]
    MissingField(&'static str),
    #[error("Hourly field `{field}` has {actual} samples, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Hourly field `{field}` is not a numeric array: {message}")]
    InvalidValues { field: &'static str, message: String },
}

/// Errors surfaced by the weather crate to its callers.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Malformed provider data: {0}")]
    DataShape(#[from] DataShapeError),
    #[error("No hourly sample matches `{target}`")]
    NotFound { target: String },
    #[error("Invalid hour: {0:?}")]
    InvalidHour(String),
    #[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        Self::Provider(ProviderError::Network(e))
    }
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(ProviderError::Network(_)) => {
                "Weather service unreachable. Check your connection.".to_string()
            }
            Self::Provider(ProviderError::HttpStatus { status, .. }) => {
                format!("Weather service returned an error ({})", status)
            }
            Self::Provider(ProviderError::Parse(_)) | Self::DataShape(_) => {
                "Weather service returned unexpected data".to_string()
            }
            Self::NotFound { .. } => "No forecast is available for that time".to_string(),
            Self::InvalidHour(_) => "The entered time is incorrect".to_string(),
            Self::InvalidCoordinates { .. } => "Coordinates are out of range".to_string(),
        }
    }

    /// Whether a caller could reasonably try again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(ProviderError::Network(_)) => true,
            Self::Provider(ProviderError::HttpStatus { status, .. }) => {
                *status >= 500 || *status == 429
            }
            _ => false,
        }
    }
}
