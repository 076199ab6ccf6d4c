use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{WeatherProvider, WeatherResult};

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct OpenWeather {
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    weather: Vec<OwmCondition>,
    main: OwmMain,
    wind: OwmWind,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

impl OpenWeather {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeather {
    fn name(&self) -> &str {
        "OpenWeatherMap"
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherResult> {
        let resp = self
            .client
            .get(CURRENT_URL)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("units", "metric".to_string()),
                ("lang", "nl".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .context("OpenWeatherMap request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("OpenWeatherMap API error ({status})");
        }

        let data: OwmResponse = resp
            .json()
            .await
            .context("Failed to parse OpenWeatherMap response")?;
        let condition = data
            .weather
            .first()
            .context("No condition in OpenWeatherMap response")?;

        let temperature_c = data.main.temp.round() as i32;
        let feels_like_c = data.main.feels_like.round() as i32;
        // wind.speed arrives in m/s with metric units
        let wind_kph = (data.wind.speed * 3.6).round() as i32;
        let icon = icon_glyph(&condition.icon, &condition.main).to_string();

        Ok(WeatherResult {
            temperature_c,
            feels_like_c,
            condition: condition.description.clone(),
            summary: WeatherResult::summary_line(&icon, temperature_c, feels_like_c),
            icon,
            humidity_pct: data.main.humidity,
            wind_kph,
        })
    }
}

/// OpenWeatherMap icon codes to glyphs, falling back to a condition-name
/// lookup for codes outside the table.
fn icon_glyph(icon: &str, main: &str) -> &'static str {
    match icon {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" => "⛅",
        "02n" | "03d" | "03n" | "04d" | "04n" => "☁️",
        "09d" | "09n" | "10n" => "🌧️",
        "10d" => "🌦️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => condition_glyph(main),
    }
}

fn condition_glyph(condition: &str) -> &'static str {
    let condition = condition.to_lowercase();
    if condition.contains("clear") || condition.contains("sunny") {
        "☀️"
    } else if condition.contains("cloud") {
        "☁️"
    } else if condition.contains("rain") {
        "🌧️"
    } else if condition.contains("snow") {
        "❄️"
    } else if condition.contains("thunder") {
        "⛈️"
    } else if condition.contains("mist") || condition.contains("fog") {
        "🌫️"
    } else if condition.contains("wind") {
        "💨"
    } else {
        "🌤️"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_table_day_night() {
        assert_eq!(icon_glyph("01d", "Clear"), "☀️");
        assert_eq!(icon_glyph("01n", "Clear"), "🌙");
        assert_eq!(icon_glyph("10d", "Rain"), "🌦️");
        assert_eq!(icon_glyph("10n", "Rain"), "🌧️");
        assert_eq!(icon_glyph("13d", "Snow"), "❄️");
        assert_eq!(icon_glyph("50n", "Mist"), "🌫️");
    }

    #[test]
    fn unknown_icon_uses_condition_name() {
        assert_eq!(icon_glyph("99x", "Thunderstorm"), "⛈️");
        assert_eq!(icon_glyph("99x", "Drizzle rain"), "🌧️");
        assert_eq!(icon_glyph("99x", "Haboob"), "🌤️");
    }

    #[test]
    fn condition_glyph_is_case_insensitive() {
        assert_eq!(condition_glyph("CLEAR SKY"), "☀️");
        assert_eq!(condition_glyph("Fog"), "🌫️");
        assert_eq!(condition_glyph("windy"), "💨");
    }

    #[test]
    fn response_normalization() {
        let json = r#"{
            "weather": [{"id": 803, "main": "Clouds", "description": "zwaar bewolkt", "icon": "04d"}],
            "main": {"temp": 17.6, "feels_like": 16.2, "temp_min": 16.0, "temp_max": 19.0, "pressure": 1018, "humidity": 77},
            "wind": {"speed": 5.2, "deg": 240}
        }"#;
        let data: OwmResponse = serde_json::from_str(json).unwrap();
        let condition = data.weather.first().unwrap();

        assert_eq!(data.main.temp.round() as i32, 18);
        assert_eq!(data.main.feels_like.round() as i32, 16);
        assert_eq!((data.wind.speed * 3.6).round() as i32, 19);
        assert_eq!(icon_glyph(&condition.icon, &condition.main), "☁️");
        assert_eq!(data.main.humidity, 77);
    }
}
