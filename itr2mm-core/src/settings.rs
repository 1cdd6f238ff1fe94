use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::error::{ModError, ModResult};
use crate::paths::InstallRoot;

const APP_NAME: &str = "ITR2ModManager";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Game installation directory (the folder holding `IntoTheRadius2.exe`).
    pub installation_root: Option<String>,
    /// Where package archives are staged while the guided installer runs.
    pub temporary_folder: Option<String>,
}

impl AppSettings {
    pub fn install_root(&self) -> ModResult<InstallRoot> {
        match self.installation_root.as_deref().map(str::trim) {
            Some(root) if !root.is_empty() => InstallRoot::new(root),
            _ => Err(ModError::config("installation root is not set")),
        }
    }

    pub fn temp_folder(&self) -> ModResult<PathBuf> {
        match self.temporary_folder.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => data_dir()
                .map(|d| d.join("temp"))
                .ok_or_else(|| ModError::config("temporary folder is not set and no data directory is available")),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

pub(crate) fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> Result<Self> {
        let dirs = project_dirs().ok_or_else(|| anyhow::anyhow!("failed to resolve config directory"))?;
        let dir = dirs.config_dir();
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { path: dir.join("settings.toml") })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn load(&self) -> Result<AppSettings> {
        if !self.path.exists() {
            return Ok(AppSettings::default());
        }
        let text = fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path.display()))?;
        let settings: AppSettings = toml::from_str(&text).context("parse settings")?;
        Ok(settings)
    }

    pub fn save(&self, settings: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(settings).context("serialize settings")?;
        fs::write(&self.path, text).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = SettingsStore::at(tmp.path().join("settings.toml"));
        assert_eq!(store.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = SettingsStore::at(tmp.path().join("nested").join("settings.toml"));
        let settings = AppSettings {
            installation_root: Some("/games/itr2".into()),
            temporary_folder: Some("/tmp/itr2mm".into()),
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        fs::write(&path, "installation_root = \"/games/itr2\"\n").unwrap();
        let settings = SettingsStore::at(&path).load().unwrap();
        assert_eq!(settings.installation_root.as_deref(), Some("/games/itr2"));
        assert_eq!(settings.temporary_folder, None);
    }

    #[test]
    fn unset_root_is_a_configuration_error() {
        let settings = AppSettings { installation_root: Some("  ".into()), ..Default::default() };
        assert!(settings.install_root().unwrap_err().is_configuration());
        assert!(AppSettings::default().install_root().unwrap_err().is_configuration());
    }

    #[test]
    fn explicit_temp_folder_wins() {
        let settings = AppSettings { temporary_folder: Some("/scratch".into()), ..Default::default() };
        assert_eq!(settings.temp_folder().unwrap(), PathBuf::from("/scratch"));
    }
}
