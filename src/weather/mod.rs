//! Current-weather lookup with a provider failover chain.
//!
//! The primary provider (OpenWeatherMap) is tried first; on any failure —
//! HTTP error, timeout, or unparseable response — the chain falls through
//! to wttr.in. Each provider carries its own condition-to-glyph table and
//! normalizes into the uniform [`WeatherResult`] shape.

mod openweather;
mod wttr;

pub use openweather::OpenWeather;
pub use wttr::Wttr;

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

/// Every provider in the chain failed.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather unavailable: {0}")]
    Unavailable(String),
}

/// Normalized current-weather observation.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherResult {
    pub temperature_c: i32,
    pub feels_like_c: i32,
    pub condition: String,
    pub icon: String,
    pub humidity_pct: u8,
    pub wind_kph: i32,
    pub summary: String,
}

impl WeatherResult {
    /// One-line summary shown next to the photo.
    pub(crate) fn summary_line(icon: &str, temperature_c: i32, feels_like_c: i32) -> String {
        format!("{icon} {temperature_c}°C (voelt als {feels_like_c}°C)")
    }
}

/// A weather data source.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// The display name of this provider.
    fn name(&self) -> &str;
    /// Fetch and normalize the current weather for a coordinate pair.
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherResult>;
}

/// Ordered provider chain; the first success wins.
pub struct WeatherLookup {
    providers: Vec<Box<dyn WeatherProvider>>,
}

impl WeatherLookup {
    /// The production chain: OpenWeatherMap, then wttr.in.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            providers: vec![
                Box::new(OpenWeather::new(api_key.into())),
                Box::new(Wttr::new()),
            ],
        }
    }

    pub fn with_providers(providers: Vec<Box<dyn WeatherProvider>>) -> Self {
        Self { providers }
    }

    /// Current weather for a coordinate pair, normalized regardless of
    /// which provider answered.
    pub async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherResult, WeatherError> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            match provider.fetch(latitude, longitude).await {
                Ok(weather) => {
                    log::debug!("weather from {}: {}", provider.name(), weather.summary);
                    return Ok(weather);
                }
                Err(err) => {
                    log::warn!("{} failed: {err}", provider.name());
                    errors.push(format!("{}: {err}", provider.name()));
                }
            }
        }

        Err(WeatherError::Unavailable(errors.join("; ")))
    }
}
