use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

pub const SETTINGS_DIRECTORY_NAME: &str = "docent";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
/// Fixed local address of the QA backend.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Load-only backend settings.
///
/// There is no settings UI and no environment layer; the JSON file exists so
/// the backend address is not hardcoded into the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl BackendSettings {
    /// Loads settings from the default config path.
    pub fn load() -> Self {
        Self::load_from(&Self::default_config_path())
    }

    /// Loads settings from an explicit path, tolerating missing or malformed
    /// files by logging and falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Json::file(path));

        match figment.extract::<Self>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Self::default()
            }
        }
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".docent"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim().to_string();
        if self.base_url.is_empty() {
            self.base_url = default_base_url();
        }

        self
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_fixed_local_address() {
        let settings = BackendSettings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn blank_base_url_normalizes_to_default() {
        let settings = BackendSettings {
            base_url: "   ".to_string(),
        };
        assert_eq!(settings.normalized().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = BackendSettings::load_from(Path::new("/nonexistent/docent-settings.json"));
        assert_eq!(settings, BackendSettings::default());
    }
}
