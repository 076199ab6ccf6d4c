use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use super::{
    CapabilityError, Capabilities, PermissionGrants, PhotoFile, Position, PositionOptions,
    probe_connectivity,
};

const GEOLOCATION_URL: &str = "https://ipapi.co/json/";

/// Workstation capability provider.
///
/// There is no camera; gallery picks take the newest image under a
/// configured directory; positions come from an IP-geolocation lookup
/// (coarse, but the same service class a browser falls back to); sharing
/// opens the post link in the default browser.
pub struct DesktopCapabilities {
    gallery_dir: PathBuf,
    client: reqwest::Client,
    last_fix: Mutex<Option<(Instant, Position)>>,
}

#[derive(Debug, Deserialize)]
struct IpGeoResponse {
    latitude: f64,
    longitude: f64,
}

impl DesktopCapabilities {
    pub fn new(gallery_dir: PathBuf) -> Self {
        Self {
            gallery_dir,
            client: reqwest::Client::new(),
            last_fix: Mutex::new(None),
        }
    }

    /// Newest image file under the gallery directory.
    fn newest_gallery_image(&self) -> Result<PathBuf, CapabilityError> {
        let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in WalkDir::new(&self.gallery_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !has_image_extension(path) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path.to_path_buf()));
            }
        }
        newest
            .map(|(_, path)| path)
            .ok_or_else(|| CapabilityError::EmptyGallery(self.gallery_dir.clone()))
    }
}

fn has_image_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| super::IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl Capabilities for DesktopCapabilities {
    fn is_native(&self) -> bool {
        false
    }

    async fn capture_from_camera(&self) -> Result<PhotoFile, CapabilityError> {
        Err(CapabilityError::Unsupported("camera capture"))
    }

    async fn pick_from_gallery(&self) -> Result<PhotoFile, CapabilityError> {
        let path = self.newest_gallery_image()?;
        log::debug!("gallery pick: {}", path.display());
        PhotoFile::from_path(&path)
    }

    async fn current_position(&self, opts: PositionOptions) -> Result<Position, CapabilityError> {
        // A cached fix within max_age is reused without a new lookup.
        {
            let cached = self.last_fix.lock().await;
            if let Some((at, position)) = *cached {
                if at.elapsed() <= opts.max_age {
                    log::debug!("reusing cached position fix ({:?} old)", at.elapsed());
                    return Ok(position);
                }
            }
        }

        // IP geolocation has a single accuracy tier; the high_accuracy flag
        // only shapes the timeout budget upstream.
        let response = self
            .client
            .get(GEOLOCATION_URL)
            .timeout(opts.timeout)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CapabilityError::PositionUnavailable("geolocation lookup timed out".into())
                } else {
                    CapabilityError::PositionUnavailable(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(CapabilityError::PositionUnavailable(format!(
                "geolocation service returned HTTP {}",
                response.status()
            )));
        }

        let geo: IpGeoResponse = response
            .json()
            .await
            .map_err(|err| CapabilityError::PositionUnavailable(err.to_string()))?;

        let position = Position {
            latitude: geo.latitude,
            longitude: geo.longitude,
            accuracy: None,
            altitude: None,
            heading: None,
            speed: None,
            timestamp: Utc::now(),
        };
        *self.last_fix.lock().await = Some((Instant::now(), position));
        Ok(position)
    }

    async fn network_connected(&self) -> bool {
        probe_connectivity().await
    }

    async fn request_permissions(&self) -> PermissionGrants {
        // No OS-level prompts to perform on a workstation.
        PermissionGrants {
            camera: true,
            location: true,
        }
    }

    async fn share_post(
        &self,
        url: &str,
        title: &str,
    ) -> Result<Option<String>, CapabilityError> {
        match webbrowser::open(url) {
            Ok(()) => {
                log::info!("opened \"{title}\" in the default browser");
                Ok(None)
            }
            Err(err) => {
                log::debug!("browser open failed ({err}), falling back to link text");
                Ok(Some(format!("Link om te delen: {url}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dir: &std::path::Path) -> DesktopCapabilities {
        DesktopCapabilities::new(dir.to_path_buf())
    }

    #[tokio::test]
    async fn camera_is_unsupported() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = provider(dir.path()).capture_from_camera().await.unwrap_err();
        assert!(matches!(err, CapabilityError::Unsupported(_)));
    }

    #[tokio::test]
    async fn gallery_pick_empty_dir_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = provider(dir.path()).pick_from_gallery().await.unwrap_err();
        assert!(matches!(err, CapabilityError::EmptyGallery(_)));
    }

    #[tokio::test]
    async fn gallery_pick_takes_newest_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let old = dir.path().join("old.jpg");
        let new = dir.path().join("new.jpg");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&new, b"new").unwrap();

        let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        let file = std::fs::File::options().write(true).open(&old).unwrap();
        file.set_modified(earlier).unwrap();

        let photo = provider(dir.path()).pick_from_gallery().await.unwrap();
        assert_eq!(photo.file_name, "new.jpg");
    }

    #[tokio::test]
    async fn gallery_pick_ignores_non_images() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        let err = provider(dir.path()).pick_from_gallery().await.unwrap_err();
        assert!(matches!(err, CapabilityError::EmptyGallery(_)));
    }

    #[tokio::test]
    async fn permissions_are_optimistic() {
        let dir = tempfile::TempDir::new().unwrap();
        let grants = provider(dir.path()).request_permissions().await;
        assert!(grants.camera);
        assert!(grants.location);
    }

    #[test]
    fn not_native() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!provider(dir.path()).is_native());
    }
}
