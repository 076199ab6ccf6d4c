use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection credentials and user preferences for the publishing pipeline.
///
/// The credential is a WordPress *application password* — a scoped,
/// revocable credential distinct from the account's login password.
///
/// # Loading
///
/// ```rust,no_run
/// use photopost::config::Settings;
///
/// // From the persisted JSON blob
/// let settings = Settings::load(Some("settings.json".as_ref())).unwrap();
///
/// // Or start from defaults and fill in the connection
/// let mut settings = Settings::default();
/// settings.site_url = "https://blog.example".into();
/// settings.username = "editor".into();
/// settings.app_password = "abcd efgh ijkl".into();
/// assert!(settings.is_configured());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the WordPress site (no trailing `/wp-json`).
    pub site_url: String,
    /// WordPress account name.
    pub username: String,
    /// Application password for the account.
    pub app_password: String,
    /// Persist these settings to disk on save. When off, saving removes
    /// any previously persisted record instead.
    pub remember_enabled: bool,
    /// Front-ends may auto-save drafts while editing.
    pub auto_save_enabled: bool,
    /// Directory scanned by the desktop gallery pick. Defaults to the
    /// current directory when unset.
    pub gallery_dir: Option<PathBuf>,
    /// API key for the primary weather provider.
    pub weather_api_key: String,
    /// Set on every successful save.
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            username: String::new(),
            app_password: String::new(),
            remember_enabled: true,
            auto_save_enabled: false,
            gallery_dir: None,
            weather_api_key: "demo".to_string(),
            last_updated_at: None,
        }
    }
}

impl Settings {
    /// A connection is configured once url, username, and credential are
    /// all non-empty. Every network operation is gated on this.
    pub fn is_configured(&self) -> bool {
        !self.site_url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.app_password.trim().is_empty()
    }

    /// Resolve the settings file path — same directory as the executable.
    pub fn settings_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("settings.json"))
    }

    /// Load settings from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::settings_path()?,
        };

        if !settings_path.exists() {
            log::warn!(
                "Settings file not found at {}. Using defaults.",
                settings_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&settings_path).context("Failed to read settings file")?;
        let settings: Settings =
            serde_json::from_str(&contents).context("Failed to parse settings file")?;
        Ok(settings)
    }

    /// Save settings to the given path, or to the default location.
    ///
    /// Writes the JSON blob only when `remember_enabled` is on; with it
    /// off, any previously persisted record is removed so nothing of the
    /// connection outlives the process. Stamps `last_updated_at` either way.
    pub fn save(&mut self, path: Option<&Path>) -> Result<()> {
        let settings_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::settings_path()?,
        };

        self.last_updated_at = Some(Utc::now());

        if !self.remember_enabled {
            if settings_path.exists() {
                std::fs::remove_file(&settings_path)
                    .context("Failed to remove persisted settings")?;
            }
            return Ok(());
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&settings_path, contents).context("Failed to write settings file")?;
        log::info!("Settings saved to {}", settings_path.display());
        Ok(())
    }

    /// Remove the persisted record and reset the in-memory state to defaults.
    pub fn clear(&mut self, path: Option<&Path>) -> Result<()> {
        let settings_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::settings_path()?,
        };

        if settings_path.exists() {
            std::fs::remove_file(&settings_path).context("Failed to remove settings file")?;
        }
        *self = Self::default();
        Ok(())
    }

    /// Write a shareable copy of the settings. The application password is
    /// excluded from the exported blob, so an import requires re-entering it.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let mut value = serde_json::to_value(self).context("Failed to serialize settings")?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("app_password");
        }
        let contents =
            serde_json::to_string_pretty(&value).context("Failed to serialize export")?;
        std::fs::write(path, contents).context("Failed to write export file")?;
        log::info!(
            "Settings exported to {} (credential omitted)",
            path.display()
        );
        Ok(())
    }

    /// Read settings from an exported copy. The resulting value is never
    /// configured: exported blobs carry no credential.
    pub fn import_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context("Failed to read import file")?;
        let settings: Settings =
            serde_json::from_str(&contents).context("Failed to parse import file")?;
        Ok(settings)
    }
}
