// src/settings.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::{ClientError, Result};

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

pub const ENV_BACKEND_URL: &str = "DECKCHAT_BACKEND_URL";
pub const ENV_EXPORT_DIR: &str = "DECKCHAT_EXPORT_DIR";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorSettings {
    /// A stream that stays silent this long is ended as an error.
    pub stall_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub max_table_rows: usize,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            stall_timeout_secs: 60,
            health_timeout_secs: 30,
            max_table_rows: 25,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportSettings {
    pub directory: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        let directory = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self { directory }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub version: u32,
    pub backend: BackendSettings,
    pub behavior: BehaviorSettings,
    pub export: ExportSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            backend: BackendSettings::default(),
            behavior: BehaviorSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.behavior.stall_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs.max(1))
    }

    /// Applies `DECKCHAT_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_BACKEND_URL).ok(),
            std::env::var(ENV_EXPORT_DIR).ok(),
        );
    }

    fn apply_overrides(&mut self, backend_url: Option<String>, export_dir: Option<String>) {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(dir) = export_dir.filter(|d| !d.trim().is_empty()) {
            self.export.directory = PathBuf::from(dir.trim());
        }
    }
}

/// Get the path to the settings file (~/.config/deckchat/settings.json)
pub fn get_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ClientError::Settings("could not determine config directory".to_string()))?;

    let app_config_dir = config_dir.join("deckchat");

    if !app_config_dir.exists() {
        fs::create_dir_all(&app_config_dir).map_err(|e| {
            ClientError::Settings(format!("failed to create config directory: {}", e))
        })?;
    }

    Ok(app_config_dir.join("settings.json"))
}

/// Load settings from `path`, creating the file with defaults if missing.
pub fn load_settings_from(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        let default_settings = AppSettings::default();
        save_settings_to(path, &default_settings)?;
        info!(path = %path.display(), "created default settings");
        return Ok(default_settings);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ClientError::Settings(format!("failed to read settings: {}", e)))?;

    let settings: AppSettings = serde_json::from_str(&content)
        .map_err(|e| ClientError::Settings(format!("failed to parse settings: {}", e)))?;

    info!(path = %path.display(), "loaded settings");
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| ClientError::Settings(format!("failed to serialize settings: {}", e)))?;

    fs::write(path, content)
        .map_err(|e| ClientError::Settings(format!("failed to write settings: {}", e)))?;

    Ok(())
}

/// Load settings from the default location and apply env overrides.
pub fn load_settings() -> Result<AppSettings> {
    let mut settings = load_settings_from(&get_settings_path()?)?;
    settings.apply_env();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = load_settings_from(&path).unwrap();

        assert_eq!(settings, AppSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"backend": {"baseUrl": "http://decks:9000"}}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();

        assert_eq!(settings.backend.base_url, "http://decks:9000");
        assert_eq!(settings.backend.request_timeout_secs, 120);
        assert_eq!(settings.behavior.stall_timeout_secs, 60);
    }

    #[test]
    fn invalid_json_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            load_settings_from(&path),
            Err(ClientError::Settings(_))
        ));
    }

    #[test]
    fn overrides_trim_trailing_slash_and_skip_blanks() {
        let mut settings = AppSettings::default();
        settings.apply_overrides(Some("http://api:8000/".to_string()), Some("  ".to_string()));

        assert_eq!(settings.backend.base_url, "http://api:8000");
        assert_eq!(settings.export, ExportSettings::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = AppSettings::default();
        settings.behavior.stall_timeout_secs = 5;

        save_settings_to(&path, &settings).unwrap();

        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }
}
