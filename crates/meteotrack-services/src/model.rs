//! Tracked locations and their single current-conditions record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a tracked location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub i64);

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A geographic point whose conditions are kept fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedLocation {
    pub id: LocationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// The one stored current-conditions snapshot of a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub id: i64,
    pub location_id: LocationId,
    /// When the conditions were ingested, not when the provider observed them.
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub atmospheric_pressure: Option<f64>,
}

/// Values written by an upsert; the store assigns the record id.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastValues {
    pub location_id: LocationId,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub atmospheric_pressure: Option<f64>,
}

impl ForecastRecord {
    /// Whether the measured fields match, ignoring id and timestamp.
    pub fn same_conditions(&self, other: &ForecastRecord) -> bool {
        self.temperature == other.temperature
            && self.wind_speed == other.wind_speed
            && self.atmospheric_pressure == other.atmospheric_pressure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: DateTime<Utc>, temperature: Option<f64>) -> ForecastRecord {
        ForecastRecord {
            id: 1,
            location_id: LocationId(7),
            timestamp,
            temperature,
            wind_speed: Some(3.0),
            atmospheric_pressure: None,
        }
    }

    #[test]
    fn test_same_conditions_ignores_timestamp() {
        let earlier = record(Utc::now(), Some(1.5));
        let later = record(earlier.timestamp + chrono::Duration::minutes(15), Some(1.5));
        assert!(earlier.same_conditions(&later));

        let warmer = record(earlier.timestamp, Some(2.5));
        assert!(!earlier.same_conditions(&warmer));
    }

    #[test]
    fn test_location_id_serializes_transparently() {
        let json = serde_json::to_string(&LocationId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(LocationId(42).to_string(), "42");
    }
}
