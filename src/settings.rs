use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

pub const ENDPOINT_ENV: &str = "CARDIAGUARD_ENDPOINT";
pub const API_KEY_ENV: &str = "CARDIAGUARD_API_KEY";
pub const EXPORT_DIR_ENV: &str = "CARDIAGUARD_EXPORT_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub analyzer: AnalyzerSettings,
    pub export_dir: PathBuf,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerSettings::default(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl UserSettings {
    /// Layer environment overrides over file values.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENDPOINT_ENV) {
            self.analyzer.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            self.analyzer.api_key = Some(key);
        }
        if let Some(dir) = lookup(EXPORT_DIR_ENV) {
            self.export_dir = PathBuf::from(dir);
        }
        self
    }
}

/// JSON settings file with defaults for anything missing.
///
/// A missing or unparsable file yields defaults rather than an error.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unparsable settings in {}: {}",
                    path.display(),
                    err
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Stored values with process environment overrides applied.
    pub fn effective(&self) -> UserSettings {
        self.read()
            .clone()
            .with_overrides(|key| std::env::var(key).ok())
    }

    pub fn stored(&self) -> UserSettings {
        self.read().clone()
    }

    pub fn update_analyzer(&self, settings: AnalyzerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.analyzer = settings;
        self.persist(&guard)
    }

    pub fn update_export_dir(&self, dir: PathBuf) -> Result<()> {
        let mut guard = self.write();
        guard.export_dir = dir;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
