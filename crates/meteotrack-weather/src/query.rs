//! Direct point queries that bypass persistence.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::instrument;

use crate::locator::{current_hour_prefix, hour_prefix, locate};
use crate::provider::WeatherProvider;
use crate::types::{CurrentConditions, HourlyField, HourlyOutcome, ReportField, WeatherError};

/// Synchronous (request/response) weather lookups built on [`WeatherProvider`].
#[derive(Debug, Clone)]
pub struct WeatherQuery {
    provider: WeatherProvider,
}

impl WeatherQuery {
    pub fn new(provider: WeatherProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &WeatherProvider {
        &self.provider
    }

    /// Current temperature and wind, with sea-level pressure for the current local hour.
    pub async fn current_conditions(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CurrentConditions, WeatherError> {
        self.current_conditions_at(latitude, longitude, Local::now().naive_local())
            .await
    }

    /// Same as [`current_conditions`](Self::current_conditions) with an explicit clock.
    #[instrument(skip(self), level = "debug")]
    pub async fn current_conditions_at(
        &self,
        latitude: f64,
        longitude: f64,
        now: NaiveDateTime,
    ) -> Result<CurrentConditions, WeatherError> {
        let payload = self
            .provider
            .fetch(latitude, longitude, &[HourlyField::PressureMsl])
            .await?;

        let target = current_hour_prefix(now);
        let index = locate(&payload.hourly.time, &target)
            .ok_or(WeatherError::NotFound { target })?;

        Ok(CurrentConditions {
            temperature: Some(payload.current.temperature),
            wind_speed: Some(payload.current.wind_speed),
            atmospheric_pressure: payload.hourly.value_at(HourlyField::PressureMsl, index),
            observed_at: payload.current.observed_at,
        })
    }

    /// Requested fields for `hour` of today.
    ///
    /// `hour` is `"HH"` or `"HH:MM"`; only the hour part is used.
    pub async fn conditions_at_hour(
        &self,
        latitude: f64,
        longitude: f64,
        hour: &str,
        fields: &[ReportField],
    ) -> Result<HourlyOutcome, WeatherError> {
        self.conditions_at_hour_on(latitude, longitude, Local::now().date_naive(), hour, fields)
            .await
    }

    /// Same as [`conditions_at_hour`](Self::conditions_at_hour) for an explicit date.
    #[instrument(skip(self), level = "debug")]
    pub async fn conditions_at_hour_on(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
        hour: &str,
        fields: &[ReportField],
    ) -> Result<HourlyOutcome, WeatherError> {
        let hour = parse_hour(hour)?;

        if fields.is_empty() {
            return Ok(HourlyOutcome::NoParametersRequested);
        }

        let mut hourly_fields: Vec<HourlyField> =
            fields.iter().map(ReportField::hourly_field).collect();
        hourly_fields.sort();
        hourly_fields.dedup();

        let payload = self
            .provider
            .fetch(latitude, longitude, &hourly_fields)
            .await?;

        let target = hour_prefix(date, hour);
        let index = locate(&payload.hourly.time, &target)
            .ok_or(WeatherError::NotFound { target })?;

        let values: BTreeMap<ReportField, Option<f64>> = fields
            .iter()
            .map(|field| (*field, payload.hourly.value_at(field.hourly_field(), index)))
            .collect();

        Ok(HourlyOutcome::Values(values))
    }
}

/// Validate `input` as `HH` or `HH:MM` and return the hour (00..=23).
pub fn parse_hour(input: &str) -> Result<u32, WeatherError> {
    let invalid = || WeatherError::InvalidHour(input.to_string());

    let digits = input.get(..2).ok_or_else(invalid)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    // Only an optional `:MM` suffix may follow the hour.
    match input.get(2..) {
        Some("") => {}
        Some(rest) => {
            let minutes = rest.strip_prefix(':').ok_or_else(invalid)?;
            let minute: u32 = match minutes.len() {
                2 if minutes.bytes().all(|b| b.is_ascii_digit()) => {
                    minutes.parse().map_err(|_| invalid())?
                }
                _ => return Err(invalid()),
            };
            if minute > 59 {
                return Err(invalid());
            }
        }
        None => return Err(invalid()),
    }

    let hour: u32 = digits.parse().map_err(|_| invalid())?;
    if hour > 23 {
        return Err(invalid());
    }
    Ok(hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hour_accepts_two_digits() {
        assert_eq!(parse_hour("00").unwrap(), 0);
        assert_eq!(parse_hour("09").unwrap(), 9);
        assert_eq!(parse_hour("23").unwrap(), 23);
        assert_eq!(parse_hour("15:30").unwrap(), 15);
        assert_eq!(parse_hour("23:59").unwrap(), 23);
    }

    #[test]
    fn test_parse_hour_rejects_invalid() {
        for input in ["", "7", "24", "99", "ab", "-1", "1a", "+1", "123", "15h"] {
            assert!(
                matches!(parse_hour(input), Err(WeatherError::InvalidHour(_))),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_hour_rejects_malformed_minutes() {
        for input in ["15:", "15:zz", "15:3", "15:300", "15:60", "15:3a", "15::30", "15 :30"] {
            assert!(
                matches!(parse_hour(input), Err(WeatherError::InvalidHour(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_hour_rejects_multibyte_input() {
        assert!(parse_hour("é1").is_err());
    }
}
