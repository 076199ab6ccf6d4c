//! Host capability access — camera, gallery, geolocation, connectivity, share.
//!
//! The [`Capabilities`] trait unifies the two supported environments behind
//! one interface, selected once at startup by [`detect`] and injected into
//! the rest of the pipeline:
//!
//! - [`TermuxCapabilities`] — an Android device running Termux, driven
//!   through the `termux-api` command suite (camera, GPS, share sheet).
//! - [`DesktopCapabilities`] — a workstation: gallery picks from a
//!   directory, positions from an IP-geolocation lookup, sharing via the
//!   default browser.

mod desktop;
mod termux;

pub use desktop::DesktopCapabilities;
pub use termux::TermuxCapabilities;

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Settings;

/// Image extensions accepted by the gallery pick.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];

/// A photo normalized to an in-memory file: generated or original name,
/// sniffed MIME type, and the raw bytes.
#[derive(Debug, Clone)]
pub struct PhotoFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    /// Load a photo from disk, sniffing the true content type from the
    /// bytes. Unrecognized content falls back to `image/jpeg`.
    pub fn from_path(path: &Path) -> Result<Self, CapabilityError> {
        let bytes = std::fs::read(path)?;
        let mime_type = sniff_mime(&bytes);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(generated_file_name);
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// Sniff a MIME type from image bytes.
pub(crate) fn sniff_mime(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "image/jpeg".to_string())
}

/// Generated filename for captured photos, `photo_<millis>.jpg`.
pub(crate) fn generated_file_name() -> String {
    format!("photo_{}.jpg", Utc::now().timestamp_millis())
}

/// Accuracy/latency trade-off for a position request.
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub max_age: Duration,
}

impl PositionOptions {
    /// High accuracy, short timeout, fresh fixes only.
    pub fn strict() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(60),
        }
    }

    /// Lower accuracy, longer timeout, cached fixes up to five minutes old.
    pub fn relaxed() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(15),
            max_age: Duration::from_secs(300),
        }
    }
}

/// A device position fix.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy)]
pub struct PermissionGrants {
    pub camera: bool,
    pub location: bool,
}

/// Failures from the host capability layer.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability not supported on this host: {0}")]
    Unsupported(&'static str),
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("no image files found under {}", .0.display())]
    EmptyGallery(PathBuf),
    #[error("host bridge failed: {0}")]
    Bridge(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Unified access to host primitives.
///
/// Implementations are selected once by [`detect`] and shared as a trait
/// object; callers never branch on the environment themselves.
#[async_trait::async_trait]
pub trait Capabilities: Send + Sync {
    /// Whether this host is the native (on-device) environment.
    fn is_native(&self) -> bool;

    /// Capture a new photo with the device camera.
    async fn capture_from_camera(&self) -> Result<PhotoFile, CapabilityError>;

    /// Pick an existing photo from the host's gallery.
    async fn pick_from_gallery(&self) -> Result<PhotoFile, CapabilityError>;

    /// Obtain the current position within the given accuracy/timeout bounds.
    async fn current_position(&self, opts: PositionOptions) -> Result<Position, CapabilityError>;

    /// Best-effort connectivity check. Never errors; ambiguous internal
    /// failures report connected so downstream calls are still attempted.
    async fn network_connected(&self) -> bool;

    /// Request camera and location permissions. Idempotent.
    async fn request_permissions(&self) -> PermissionGrants;

    /// Share a published post. Hosts without a share sheet fall back to a
    /// returned confirmation string instead of erroring.
    async fn share_post(
        &self,
        url: &str,
        title: &str,
    ) -> Result<Option<String>, CapabilityError>;
}

/// Select the capability provider for this process.
///
/// Termux sets `TERMUX_VERSION` in every session; its presence marks the
/// native environment. Everything else gets the desktop provider.
pub fn detect(settings: &Settings) -> Arc<dyn Capabilities> {
    if std::env::var_os("TERMUX_VERSION").is_some() {
        log::info!("native environment detected (Termux)");
        Arc::new(TermuxCapabilities::new())
    } else {
        let gallery_dir = settings
            .gallery_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        log::info!(
            "desktop environment selected, gallery at {}",
            gallery_dir.display()
        );
        Arc::new(DesktopCapabilities::new(gallery_dir))
    }
}

/// Probe connectivity by opening a TCP connection to well-known anycast
/// hosts. Refused/unreachable probes are offline evidence; anything
/// ambiguous (sandboxing, odd socket errors) reports connected.
pub(crate) async fn probe_connectivity() -> bool {
    const PROBES: &[&str] = &["1.1.1.1:443", "8.8.8.8:53"];
    const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

    let mut ambiguous_failure = false;
    for addr in PROBES {
        match tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return true,
            Ok(Err(err)) => match err.kind() {
                ErrorKind::ConnectionRefused
                | ErrorKind::TimedOut
                | ErrorKind::HostUnreachable
                | ErrorKind::NetworkUnreachable => {
                    log::debug!("connectivity probe {addr} failed: {err}");
                }
                _ => {
                    log::debug!("connectivity probe {addr} errored internally: {err}");
                    ambiguous_failure = true;
                }
            },
            Err(_) => log::debug!("connectivity probe {addr} timed out"),
        }
    }
    ambiguous_failure
}

/// Check whether an executable is reachable through `PATH`.
pub(crate) fn binary_on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
}
