use crate::models::QualitySelector;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "yt_dlp_gui_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub download_dir: Option<PathBuf>,
    pub quality: Option<QualitySelector>,
    pub theme: Theme,
}

pub struct SettingsStore {
    settings_file: PathBuf,
}

impl SettingsStore {
    pub fn new(settings_file: impl Into<PathBuf>) -> Self {
        Self {
            settings_file: settings_file.into(),
        }
    }

    /// `~/yt_dlp_gui_config.json`
    pub fn in_home_dir() -> Result<Self> {
        let home = dirs::home_dir().context("Failed to locate home directory")?;
        Ok(Self::new(home.join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.settings_file
    }

    pub fn load(&self) -> Result<AppSettings> {
        if !self.settings_file.exists() {
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&self.settings_file)
            .context("Failed to read settings file")?;

        serde_json::from_str(&content).context("Failed to parse settings file")
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)
            .context("Failed to serialize settings")?;

        if let Some(parent) = self.settings_file.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        fs::write(&self.settings_file, content).context("Failed to write settings file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join(SETTINGS_FILE_NAME));
        assert_eq!(store.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE_NAME));
        let settings = AppSettings {
            download_dir: Some(PathBuf::from("/media/videos")),
            quality: Some(QualitySelector::AudioMp3),
            theme: Theme::Light,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{ "download_dir": "/tmp/dl" }"#).unwrap();
        let settings = SettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.download_dir, Some(PathBuf::from("/tmp/dl")));
        assert_eq!(settings.quality, None);
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "not json").unwrap();
        assert!(SettingsStore::new(&path).load().is_err());
    }
}
