//! Best-effort photo geolocation.
//!
//! [`LocationResolver`] runs an ordered list of named strategies — strict
//! device fix, EXIF extraction, relaxed device fix — stopping at the first
//! success and recording which strategy produced the result. Reverse
//! geocoding failures never fail a strategy: coordinates are kept with a
//! numeric fallback name.

mod exif;

pub use exif::dms_to_decimal;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::capability::{Capabilities, PhotoFile, PositionOptions};
use crate::geocode::Geocoder;

/// All location strategies exhausted.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("no location available: {0}")]
    Unavailable(String),
}

/// Where a location fix came from. Disclosed to the user alongside the
/// accuracy radius so provenance is never ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationSource {
    DeviceGpsPrimary,
    DeviceGpsFallback,
    BrowserGeolocationPrimary,
    BrowserGeolocationFallback,
    ExifPhoto,
    UserAdjusted,
}

impl LocationSource {
    /// Stable identifier, also the serialized form.
    pub fn tag(self) -> &'static str {
        match self {
            Self::DeviceGpsPrimary => "device-gps-primary",
            Self::DeviceGpsFallback => "device-gps-fallback",
            Self::BrowserGeolocationPrimary => "browser-geolocation-primary",
            Self::BrowserGeolocationFallback => "browser-geolocation-fallback",
            Self::ExifPhoto => "exif-photo",
            Self::UserAdjusted => "user-adjusted",
        }
    }

    /// User-facing description of the source.
    pub fn description(self) -> &'static str {
        match self {
            Self::DeviceGpsPrimary => "📱 Huidige GPS-locatie",
            Self::DeviceGpsFallback => "📱 GPS-locatie (lagere precisie)",
            Self::BrowserGeolocationPrimary => "🌐 Huidige netwerk-locatie",
            Self::BrowserGeolocationFallback => "🌐 Netwerk-locatie (lagere precisie)",
            Self::ExifPhoto => "📷 Locatie uit foto EXIF-data",
            Self::UserAdjusted => "👤 Handmatig aangepast",
        }
    }
}

/// A resolved photo location. Replaced wholesale when the user drags the
/// map pin or selects a new photo.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResult {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub place_name: Option<String>,
    pub formatted_address: Option<String>,
    pub map_url: String,
    pub source: LocationSource,
    pub resolved_at: DateTime<Utc>,
}

impl LocationResult {
    /// Numeric stand-in name used when geocoding is unavailable.
    pub fn numeric_name(latitude: f64, longitude: f64) -> String {
        format!("{latitude:.4}°, {longitude:.4}°")
    }

    pub fn map_url_for(latitude: f64, longitude: f64) -> String {
        format!("https://maps.google.com/?q={latitude},{longitude}")
    }
}

/// The ordered fallback chain. Evaluation stops at the first success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    DeviceStrict,
    ExifPhoto,
    DeviceRelaxed,
}

impl Strategy {
    fn name(self) -> &'static str {
        match self {
            Self::DeviceStrict => "device-strict",
            Self::ExifPhoto => "exif-photo",
            Self::DeviceRelaxed => "device-relaxed",
        }
    }
}

const STRATEGY_ORDER: [Strategy; 3] = [
    Strategy::DeviceStrict,
    Strategy::ExifPhoto,
    Strategy::DeviceRelaxed,
];

/// Resolves a best-effort location for a selected photo.
pub struct LocationResolver {
    capabilities: Arc<dyn Capabilities>,
    geocoder: Arc<dyn Geocoder>,
}

impl LocationResolver {
    pub fn new(capabilities: Arc<dyn Capabilities>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            capabilities,
            geocoder,
        }
    }

    /// Run the fallback chain for a freshly selected photo.
    pub async fn resolve(&self, photo: &PhotoFile) -> Result<LocationResult, LocationError> {
        let mut failures = Vec::new();

        for strategy in STRATEGY_ORDER {
            match self.attempt(strategy, photo).await {
                Ok(result) => {
                    log::info!(
                        "location resolved via {} ({})",
                        strategy.name(),
                        result.source.tag()
                    );
                    return Ok(result);
                }
                Err(err) => {
                    log::warn!("location strategy {} failed: {err}", strategy.name());
                    failures.push(format!("{}: {err}", strategy.name()));
                }
            }
        }

        Err(LocationError::Unavailable(failures.join("; ")))
    }

    /// Re-resolve after the user dragged the map pin. Never fails: a
    /// geocoding failure keeps the new coordinates under a placeholder
    /// name rather than blocking the edit.
    pub async fn adjust(&self, latitude: f64, longitude: f64) -> LocationResult {
        self.build_result(latitude, longitude, None, LocationSource::UserAdjusted)
            .await
    }

    async fn attempt(&self, strategy: Strategy, photo: &PhotoFile) -> Result<LocationResult> {
        match strategy {
            Strategy::DeviceStrict => {
                self.from_device(PositionOptions::strict(), true).await
            }
            Strategy::ExifPhoto => self.from_exif(photo).await,
            Strategy::DeviceRelaxed => {
                self.from_device(PositionOptions::relaxed(), false).await
            }
        }
    }

    async fn from_device(&self, opts: PositionOptions, primary: bool) -> Result<LocationResult> {
        if self.capabilities.is_native() {
            let grants = self.capabilities.request_permissions().await;
            if !grants.location {
                bail!("location permission not granted");
            }
        }

        let position = self.capabilities.current_position(opts).await?;
        log::debug!(
            "device position: {:.6}, {:.6} (accuracy {:?})",
            position.latitude,
            position.longitude,
            position.accuracy
        );

        let source = match (self.capabilities.is_native(), primary) {
            (true, true) => LocationSource::DeviceGpsPrimary,
            (true, false) => LocationSource::DeviceGpsFallback,
            (false, true) => LocationSource::BrowserGeolocationPrimary,
            (false, false) => LocationSource::BrowserGeolocationFallback,
        };

        Ok(self
            .build_result(position.latitude, position.longitude, position.accuracy, source)
            .await)
    }

    async fn from_exif(&self, photo: &PhotoFile) -> Result<LocationResult> {
        // Native camera captures strip EXIF before they reach the adapter;
        // only the non-native path can read GPS tags from the file itself.
        if self.capabilities.is_native() {
            bail!("EXIF extraction skipped for native captures");
        }

        let (latitude, longitude) = exif::gps_coordinates(&photo.bytes)?;
        Ok(self
            .build_result(latitude, longitude, None, LocationSource::ExifPhoto)
            .await)
    }

    async fn build_result(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        source: LocationSource,
    ) -> LocationResult {
        let (place_name, formatted_address) =
            match self.geocoder.resolve(latitude, longitude).await {
                Ok(place) => (Some(place.place_name), place.formatted_address),
                Err(err) => {
                    log::warn!("reverse geocoding failed, keeping coordinates: {err}");
                    (Some(LocationResult::numeric_name(latitude, longitude)), None)
                }
            };

        LocationResult {
            latitude,
            longitude,
            accuracy,
            place_name,
            formatted_address,
            map_url: LocationResult::map_url_for(latitude, longitude),
            source,
            resolved_at: Utc::now(),
        }
    }
}
