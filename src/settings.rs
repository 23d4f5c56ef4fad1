use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::state_machine::DEFAULT_WINDOW_DAYS;

const APP_DIR_NAME: &str = "searchlight";
const SETTINGS_FILE_NAME: &str = "settings.json";

pub const ENV_BASE_URL: &str = "SEARCHLIGHT_BASE_URL";
pub const ENV_WINDOW_DAYS: &str = "SEARCHLIGHT_WINDOW_DAYS";
pub const ENV_TIMEOUT_SECS: &str = "SEARCHLIGHT_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the analytical store gateway.
    pub base_url: String,

    /// Trailing window in days applied to windowed tabs at startup.
    pub window_days: u32,

    /// Request timeout for gateway calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            timeout_secs: 30,
        }
    }
}

fn settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
    Ok(dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings() -> AppSettings {
    let path = match settings_path() {
        Ok(p) => p,
        Err(e) => {
            log::warn!("Settings: {}", e);
            return AppSettings::default();
        }
    };
    load_settings_from(&path)
}

fn load_settings_from(path: &Path) -> AppSettings {
    let mut settings = match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    };

    if settings.window_days == 0 {
        log::warn!(
            "Settings: window_days must be at least 1, using {}",
            DEFAULT_WINDOW_DAYS
        );
        settings.window_days = DEFAULT_WINDOW_DAYS;
    }
    settings
}

pub fn save_settings(settings: &AppSettings) -> Result<(), String> {
    let path = settings_path()?;
    save_settings_to(&path, settings)
}

fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write atomically: write to a temp file in the same directory, then rename.
    // This prevents partial/corrupt settings.json if the app crashes mid-write.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // On Unix, rename will atomically replace the destination. On Windows, rename
    // fails if the destination exists, so we remove it first (ignoring NotFound).
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(format!("Remove existing settings file {:?}: {}", path, e));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
    Ok(())
}

/// Apply `SEARCHLIGHT_*` environment overrides on top of loaded settings.
pub fn apply_env_overrides(settings: &mut AppSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

fn apply_overrides_from(settings: &mut AppSettings, get: impl Fn(&str) -> Option<String>) {
    if let Some(url) = get(ENV_BASE_URL) {
        if !url.trim().is_empty() {
            settings.base_url = url;
        }
    }
    if let Some(days) = get(ENV_WINDOW_DAYS) {
        match days.parse::<u32>() {
            Ok(days) if days > 0 => settings.window_days = days,
            _ => log::warn!("Settings: ignoring invalid {}={:?}", ENV_WINDOW_DAYS, days),
        }
    }
    if let Some(secs) = get(ENV_TIMEOUT_SECS) {
        match secs.parse::<u64>() {
            Ok(secs) if secs > 0 => settings.timeout_secs = secs,
            _ => log::warn!("Settings: ignoring invalid {}={:?}", ENV_TIMEOUT_SECS, secs),
        }
    }
}
