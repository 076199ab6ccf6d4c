//! Post body and custom-field composition.
//!
//! Blocks are appended in a fixed order — base content, rating, tags,
//! location, weather — and a block is only present when its data is.
//! The meta map mirrors the same data in flat keys so the site can query
//! posts without parsing body text.

use serde_json::{Map, Value, json};

use crate::location::LocationResult;
use crate::weather::WeatherResult;

/// Compose the post body.
pub fn compose_body(
    content: &str,
    rating: u8,
    tags: &[String],
    location: Option<&LocationResult>,
    weather: Option<&WeatherResult>,
) -> String {
    let mut body = content.to_string();
    let rating = rating.min(5);

    if rating > 0 {
        let stars = "⭐".repeat(rating as usize);
        let empty_stars = "☆".repeat(5 - rating as usize);
        body.push_str(&format!(
            "\n\n📊 **Beoordeling:** {stars}{empty_stars} ({rating}/5 sterren)"
        ));
    }

    if !tags.is_empty() {
        let tag_line = tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ");
        body.push_str(&format!("\n\n🏷️ **Tags:** {tag_line}"));
    }

    if let Some(location) = location {
        match &location.place_name {
            Some(name) => {
                body.push_str(&format!("\n\n📍 **Locatie:** {name}"));
                body.push_str(&format!(
                    "\n🌐 **Coördinaten:** {:.6}°, {:.6}°",
                    location.latitude, location.longitude
                ));
                if let Some(address) = &location.formatted_address {
                    body.push_str(&format!("\n🗺️ **Volledig adres:** {address}"));
                }
            }
            None => {
                body.push_str(&format!(
                    "\n\n📍 **Locatie:** {:.6}°, {:.6}°",
                    location.latitude, location.longitude
                ));
            }
        }
        body.push_str(&format!(
            "\n🗺️ <a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" \
             style=\"color: #2563eb; text-decoration: underline;\">Bekijk locatie op Google Maps</a>",
            location.map_url
        ));
    }

    if let Some(weather) = weather {
        body.push_str(&format!(
            "\n\n🌤️ **Weer tijdens foto:** {} {}°C",
            weather.icon, weather.temperature_c
        ));
        body.push_str(&format!(
            "\n🌡️ **Gevoelstemperatuur:** {}°C",
            weather.feels_like_c
        ));
        body.push_str(&format!("\n💨 **Wind:** {} km/h", weather.wind_kph));
        body.push_str(&format!("\n💧 **Luchtvochtigheid:** {}%", weather.humidity_pct));
        if !weather.condition.is_empty() {
            body.push_str(&format!("\n☁️ **Omstandigheden:** {}", weather.condition));
        }
    }

    body
}

/// Build the flat custom-fields map mirroring the composed blocks.
pub fn build_meta(
    rating: u8,
    tags: &[String],
    location: Option<&LocationResult>,
    weather: Option<&WeatherResult>,
) -> Map<String, Value> {
    let mut meta = Map::new();
    let rating = rating.min(5);

    if rating > 0 {
        meta.insert("rating".into(), json!(rating));
    }

    if !tags.is_empty() {
        meta.insert("custom_tags".into(), json!(tags.join(",")));
    }

    if let Some(location) = location {
        meta.insert("location_latitude".into(), json!(location.latitude));
        meta.insert("location_longitude".into(), json!(location.longitude));
        meta.insert("location_map_url".into(), json!(location.map_url));
        if let Some(name) = &location.place_name {
            meta.insert("location_name".into(), json!(name));
        }
        if let Some(address) = &location.formatted_address {
            meta.insert("location_address".into(), json!(address));
        }
    }

    if let Some(weather) = weather {
        meta.insert("weather_temperature".into(), json!(weather.temperature_c));
        meta.insert("weather_feels_like".into(), json!(weather.feels_like_c));
        meta.insert("weather_condition".into(), json!(weather.condition));
        meta.insert("weather_icon".into(), json!(weather.icon));
        meta.insert("weather_humidity".into(), json!(weather.humidity_pct));
        meta.insert("weather_wind_speed".into(), json!(weather.wind_kph));
        meta.insert("weather_summary".into(), json!(weather.summary));
    }

    meta
}
