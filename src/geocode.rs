//! Reverse geocoding — coordinates to a human-readable place name.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::capability::Capabilities;

const REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";
const GEOCODE_TIMEOUT: Duration = Duration::from_secs(8);
const UNKNOWN_PLACE: &str = "Onbekende locatie";

/// Failures from reverse geocoding, distinguished so callers can message a
/// slow lookup differently from a broken one.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("reverse geocoding timed out")]
    Timeout,
    #[error("reverse geocoding unavailable: {0}")]
    Unavailable(String),
    #[error("no network connectivity")]
    NoConnectivity,
}

/// A resolved place for a coordinate pair.
#[derive(Debug, Clone)]
pub struct ResolvedPlace {
    /// Short human name, at most three locality parts.
    pub place_name: String,
    /// The provider's full display string.
    pub formatted_address: Option<String>,
    /// Raw provider response, kept for provenance display.
    pub raw: serde_json::Value,
}

/// Trait seam over reverse geocoding so the location resolver can be
/// exercised without network access.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, latitude: f64, longitude: f64) -> Result<ResolvedPlace, GeocodeError>;
}

/// Nominatim-backed [`Geocoder`].
pub struct NominatimGeocoder {
    client: reqwest::Client,
    capabilities: Arc<dyn Capabilities>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    amenity: Option<String>,
    shop: Option<String>,
    building: Option<String>,
    road: Option<String>,
    pedestrian: Option<String>,
    neighbourhood: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(capabilities: Arc<dyn Capabilities>) -> Self {
        Self {
            client: reqwest::Client::new(),
            capabilities,
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, latitude: f64, longitude: f64) -> Result<ResolvedPlace, GeocodeError> {
        if !self.capabilities.network_connected().await {
            return Err(GeocodeError::NoConnectivity);
        }

        log::debug!("reverse geocoding {latitude:.6}, {longitude:.6}");

        let response = self
            .client
            .get(REVERSE_URL)
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("zoom", "14".to_string()),
                ("addressdetails", "1".to_string()),
                ("accept-language", "nl,en".to_string()),
            ])
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Unavailable(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(GeocodeError::Unavailable(format!(
                "service returned HTTP {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|err| GeocodeError::Unavailable(err.to_string()))?;
        let parsed: NominatimResponse = serde_json::from_value(raw.clone())
            .map_err(|err| GeocodeError::Unavailable(err.to_string()))?;

        let Some(address) = parsed.address else {
            return Err(GeocodeError::Unavailable("no address data found".into()));
        };

        let place_name = build_place_name(&address, parsed.display_name.as_deref());
        log::debug!("place name resolved: {place_name}");

        Ok(ResolvedPlace {
            place_name,
            formatted_address: parsed.display_name,
            raw,
        })
    }
}

/// Build a short place name: point of interest, then street, then
/// neighborhood, then locality, then country — first three non-empty parts.
/// Falls back to the leading segments of the full display string.
fn build_place_name(address: &NominatimAddress, display_name: Option<&str>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(poi) = address
        .amenity
        .as_deref()
        .or(address.shop.as_deref())
        .or(address.building.as_deref())
    {
        parts.push(poi);
    }
    if let Some(street) = address.road.as_deref().or(address.pedestrian.as_deref()) {
        parts.push(street);
    }
    if let Some(area) = address
        .neighbourhood
        .as_deref()
        .or(address.suburb.as_deref())
    {
        parts.push(area);
    }
    if let Some(locality) = address
        .city
        .as_deref()
        .or(address.town.as_deref())
        .or(address.village.as_deref())
    {
        parts.push(locality);
    }
    if let Some(country) = address.country.as_deref() {
        parts.push(country);
    }

    let parts: Vec<&str> = parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts[..parts.len().min(3)].join(", ");
    }

    display_name
        .map(|name| {
            name.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(3)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_PLACE.to_string())
}
