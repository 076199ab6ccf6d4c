use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::{
    CapabilityError, Capabilities, PermissionGrants, PhotoFile, Position, PositionOptions,
    binary_on_path, generated_file_name, probe_connectivity, sniff_mime,
};

/// Android capability provider, bridged through the `termux-api` commands.
///
/// Each primitive maps to one command: `termux-camera-photo` for capture,
/// `termux-storage-get` for the system file picker, `termux-location` for
/// GPS/network fixes, `termux-share` for the share sheet with
/// `termux-clipboard-set` as the fallback.
pub struct TermuxCapabilities {
    last_fix: Mutex<Option<(Instant, Position)>>,
}

/// JSON emitted by `termux-location`.
#[derive(Debug, Deserialize)]
struct TermuxLocation {
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    altitude: Option<f64>,
    bearing: Option<f64>,
    speed: Option<f64>,
}

impl TermuxCapabilities {
    pub fn new() -> Self {
        Self {
            last_fix: Mutex::new(None),
        }
    }

    fn capture_target(&self) -> PathBuf {
        std::env::temp_dir().join(generated_file_name())
    }

    /// Run a termux-api command, mapping a missing binary to
    /// [`CapabilityError::Unsupported`] and a failed exit to
    /// [`CapabilityError::Bridge`].
    async fn run_bridge(
        &self,
        binary: &'static str,
        args: &[&str],
    ) -> Result<Vec<u8>, CapabilityError> {
        let output = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => CapabilityError::Unsupported(binary),
                _ => CapabilityError::Bridge(err.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("permission") || stderr.contains("Permission") {
                return Err(CapabilityError::PermissionDenied(binary));
            }
            return Err(CapabilityError::Bridge(format!(
                "{binary} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn photo_from_bridge(
        &self,
        binary: &'static str,
        extra_args: &[&str],
    ) -> Result<PhotoFile, CapabilityError> {
        let target = self.capture_target();
        let target_str = target.to_string_lossy().into_owned();
        let mut args: Vec<&str> = extra_args.to_vec();
        args.push(&target_str);
        self.run_bridge(binary, &args).await?;

        let bytes = std::fs::read(&target)?;
        let _ = std::fs::remove_file(&target);
        Ok(PhotoFile {
            file_name: generated_file_name(),
            mime_type: sniff_mime(&bytes),
            bytes,
        })
    }
}

impl Default for TermuxCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Capabilities for TermuxCapabilities {
    fn is_native(&self) -> bool {
        true
    }

    async fn capture_from_camera(&self) -> Result<PhotoFile, CapabilityError> {
        self.photo_from_bridge("termux-camera-photo", &["-c", "0"])
            .await
    }

    async fn pick_from_gallery(&self) -> Result<PhotoFile, CapabilityError> {
        self.photo_from_bridge("termux-storage-get", &[]).await
    }

    async fn current_position(&self, opts: PositionOptions) -> Result<Position, CapabilityError> {
        {
            let cached = self.last_fix.lock().await;
            if let Some((at, position)) = *cached {
                if at.elapsed() <= opts.max_age {
                    log::debug!("reusing cached position fix ({:?} old)", at.elapsed());
                    return Ok(position);
                }
            }
        }

        let provider = if opts.high_accuracy { "gps" } else { "network" };
        let stdout = tokio::time::timeout(
            opts.timeout,
            self.run_bridge("termux-location", &["-p", provider, "-r", "once"]),
        )
        .await
        .map_err(|_| {
            CapabilityError::PositionUnavailable(format!(
                "no {provider} fix within {:?}",
                opts.timeout
            ))
        })??;

        let location: TermuxLocation = serde_json::from_slice(&stdout)
            .map_err(|err| CapabilityError::PositionUnavailable(err.to_string()))?;

        let position = Position {
            latitude: location.latitude,
            longitude: location.longitude,
            accuracy: location.accuracy,
            altitude: location.altitude,
            heading: location.bearing,
            speed: location.speed,
            timestamp: Utc::now(),
        };
        *self.last_fix.lock().await = Some((Instant::now(), position));
        Ok(position)
    }

    async fn network_connected(&self) -> bool {
        probe_connectivity().await
    }

    async fn request_permissions(&self) -> PermissionGrants {
        // The termux-api commands prompt on first use; availability of the
        // bridge binaries is the useful signal here, and checking it twice
        // gives the same answer.
        PermissionGrants {
            camera: binary_on_path("termux-camera-photo"),
            location: binary_on_path("termux-location"),
        }
    }

    async fn share_post(
        &self,
        url: &str,
        title: &str,
    ) -> Result<Option<String>, CapabilityError> {
        let text = format!("Bekijk mijn nieuwe foto post: {title}\n{url}");
        match pipe_to_command("termux-share", &["-t", title], &text).await {
            Ok(()) => Ok(None),
            Err(share_err) => {
                log::debug!("share sheet failed ({share_err}), copying link to clipboard");
                pipe_to_command("termux-clipboard-set", &[], url)
                    .await
                    .map_err(|err| CapabilityError::Bridge(err.to_string()))?;
                Ok(Some("Link gekopieerd naar klembord".to_string()))
            }
        }
    }
}

/// Spawn a command and feed `input` to its stdin.
async fn pipe_to_command(binary: &str, args: &[&str], input: &str) -> std::io::Result<()> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await?;
    }
    let status = child.wait().await?;
    if !status.success() {
        return Err(std::io::Error::other(format!(
            "{binary} exited with {status}"
        )));
    }
    Ok(())
}
