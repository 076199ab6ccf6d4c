use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{WeatherProvider, WeatherResult};

const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Keyless fallback provider.
pub struct Wttr {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct WttrResponse {
    current_condition: Vec<WttrCurrent>,
}

#[derive(Debug, Deserialize)]
struct WttrCurrent {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    humidity: String,
    #[serde(rename = "windspeedKmph")]
    windspeed_kmph: String,
    #[serde(rename = "weatherCode")]
    weather_code: String,
    #[serde(rename = "lang_nl", default)]
    lang_nl: Vec<WttrValue>,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrValue>,
}

#[derive(Debug, Deserialize)]
struct WttrValue {
    value: String,
}

impl Wttr {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for Wttr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WeatherProvider for Wttr {
    fn name(&self) -> &str {
        "wttr.in"
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherResult> {
        let url = format!("https://wttr.in/{latitude},{longitude}?format=j1&lang=nl");

        let resp = self
            .client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .context("wttr.in request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("wttr.in error ({status})");
        }

        let data: WttrResponse = resp.json().await.context("Failed to parse wttr.in response")?;
        let current = data
            .current_condition
            .first()
            .context("No current condition in wttr.in response")?;

        let temperature_c = parse_num(&current.temp_c)?;
        let feels_like_c = parse_num(&current.feels_like_c)?;
        let humidity_pct = parse_num(&current.humidity)?.clamp(0, 100) as u8;
        let wind_kph = parse_num(&current.windspeed_kmph)?;
        let code: u16 = current
            .weather_code
            .parse()
            .context("Unparseable wttr.in weather code")?;

        // prefer the localized description when present
        let condition = current
            .lang_nl
            .first()
            .or_else(|| current.weather_desc.first())
            .map(|v| v.value.clone())
            .unwrap_or_default();

        let icon = code_glyph(code).to_string();

        Ok(WeatherResult {
            temperature_c,
            feels_like_c,
            condition,
            summary: WeatherResult::summary_line(&icon, temperature_c, feels_like_c),
            icon,
            humidity_pct,
            wind_kph,
        })
    }
}

/// wttr.in serves numbers as strings; some carry decimals.
fn parse_num(value: &str) -> Result<i32> {
    let parsed: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("unparseable numeric value {value:?}"))?;
    Ok(parsed.round() as i32)
}

/// WWO weather codes to glyphs.
fn code_glyph(code: u16) -> &'static str {
    match code {
        113 => "☀️",
        116 => "⛅",
        119 | 122 => "☁️",
        143 | 248 | 260 => "🌫️",
        176 | 263 | 293 | 353 => "🌦️",
        179 | 317 | 320 | 323 | 362 | 365 | 368 => "🌨️",
        182 | 185 | 266 | 281 | 284 | 296 | 299 | 302 | 305 | 308 | 311 | 314 | 350 | 356
        | 359 | 374 | 377 => "🌧️",
        200 | 386 | 389 | 392 | 395 => "⛈️",
        227 | 230 | 326 | 329 | 332 | 335 | 338 | 371 => "❄️",
        _ => "🌤️",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_table_known_codes() {
        assert_eq!(code_glyph(113), "☀️");
        assert_eq!(code_glyph(116), "⛅");
        assert_eq!(code_glyph(122), "☁️");
        assert_eq!(code_glyph(296), "🌧️");
        assert_eq!(code_glyph(338), "❄️");
        assert_eq!(code_glyph(389), "⛈️");
        assert_eq!(code_glyph(248), "🌫️");
    }

    #[test]
    fn unknown_code_defaults() {
        assert_eq!(code_glyph(0), "🌤️");
        assert_eq!(code_glyph(999), "🌤️");
    }

    #[test]
    fn parse_num_handles_decimals() {
        assert_eq!(parse_num("18").unwrap(), 18);
        assert_eq!(parse_num("17.6").unwrap(), 18);
        assert!(parse_num("niet een getal").is_err());
    }

    #[test]
    fn response_prefers_localized_condition() {
        let json = r#"{
            "current_condition": [{
                "temp_C": "9",
                "FeelsLikeC": "6",
                "humidity": "87",
                "windspeedKmph": "24",
                "weatherCode": "296",
                "lang_nl": [{"value": "Lichte regen"}],
                "weatherDesc": [{"value": "Light rain"}]
            }]
        }"#;
        let data: WttrResponse = serde_json::from_str(json).unwrap();
        let current = data.current_condition.first().unwrap();
        let condition = current
            .lang_nl
            .first()
            .or_else(|| current.weather_desc.first())
            .map(|v| v.value.clone())
            .unwrap();
        assert_eq!(condition, "Lichte regen");
        assert_eq!(code_glyph(current.weather_code.parse().unwrap()), "🌧️");
    }

    #[test]
    fn response_without_localization_uses_english() {
        let json = r#"{
            "current_condition": [{
                "temp_C": "9",
                "FeelsLikeC": "6",
                "humidity": "87",
                "windspeedKmph": "24",
                "weatherCode": "113",
                "weatherDesc": [{"value": "Sunny"}]
            }]
        }"#;
        let data: WttrResponse = serde_json::from_str(json).unwrap();
        let current = data.current_condition.first().unwrap();
        let condition = current
            .lang_nl
            .first()
            .or_else(|| current.weather_desc.first())
            .map(|v| v.value.clone())
            .unwrap();
        assert_eq!(condition, "Sunny");
    }
}
