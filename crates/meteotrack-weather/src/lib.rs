//! Weather provider access for MeteoTrack
//!
//! Fetches current and hourly conditions from Open-Meteo, locates hours in the
//! returned time series and answers direct point queries.

pub mod locator;
pub mod provider;
pub mod query;
pub mod types;

pub use locator::{current_hour_prefix, hour_prefix, locate};
pub use provider::WeatherProvider;
pub use query::WeatherQuery;
pub use types::*;
