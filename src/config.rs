use crate::analysis::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "fluentcheck";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 90;
const MAX_ANALYSIS_RETRIES: u8 = 5;

/// Key baked in at build time; the runtime environment takes precedence.
const BUILD_TIME_API_KEY: Option<&str> = option_env!("GEMINI_API_KEY");

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "API_KEY";
pub const ENV_DATA_DIR: &str = "FLUENTCHECK_DATA_DIR";
pub const ENV_MODEL: &str = "FLUENTCHECK_MODEL";
pub const ENV_INPUT_DEVICE: &str = "FLUENTCHECK_INPUT_DEVICE";
pub const ENV_ANALYSIS_TIMEOUT: &str = "FLUENTCHECK_ANALYSIS_TIMEOUT_SECS";
pub const ENV_ANALYSIS_RETRIES: &str = "FLUENTCHECK_ANALYSIS_RETRIES";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine a data directory; set FLUENTCHECK_DATA_DIR")]
    NoDataDir,

    #[error("Failed to create data dir {path:?}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Settings persisted in `config.json` next to the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_base: String,
    pub input_device_name: Option<String>,
    pub analysis_timeout_secs: u64,
    pub analysis_retries: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            input_device_name: None,
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            analysis_retries: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_key: Option<String>,
    pub settings: Settings,
}

impl AppConfig {
    /// Resolve from the process environment (after `.env` is loaded).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Resolve using `env` as the variable lookup.
    pub fn load_with<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = non_empty(env(ENV_DATA_DIR))
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join(CONFIG_DIR)))
            .ok_or(ConfigError::NoDataDir)?;
        fs::create_dir_all(&data_dir).map_err(|source| ConfigError::DataDir {
            path: data_dir.clone(),
            source,
        })?;

        let mut settings = load_or_create_settings(&data_dir);

        if let Some(model) = non_empty(env(ENV_MODEL)) {
            settings.model = model;
        }
        if let Some(device) = non_empty(env(ENV_INPUT_DEVICE)) {
            settings.input_device_name = Some(device);
        }
        if let Some(secs) = env(ENV_ANALYSIS_TIMEOUT).and_then(|v| v.trim().parse().ok()) {
            settings.analysis_timeout_secs = secs;
        }
        if let Some(retries) = env(ENV_ANALYSIS_RETRIES).and_then(|v| v.trim().parse().ok()) {
            settings.analysis_retries = retries;
        }
        normalize_settings(&mut settings);

        let api_key = non_empty(env(ENV_API_KEY))
            .or_else(|| non_empty(env(ENV_API_KEY_FALLBACK)))
            .or_else(|| non_empty(BUILD_TIME_API_KEY.map(str::to_string)));

        Ok(Self {
            data_dir,
            api_key,
            settings,
        })
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.analysis_timeout_secs)
    }

    pub fn api_key_masked(&self) -> Option<String> {
        self.api_key.as_deref().map(mask_api_key)
    }
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

fn load_or_create_settings(data_dir: &Path) -> Settings {
    let path = config_path(data_dir);
    if !path.exists() {
        let settings = Settings::default();
        if let Err(e) = save_raw(&path, &settings) {
            tracing::warn!("{}", e);
        }
        return settings;
    }

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to read config: {}", e);
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Config unreadable ({}), using defaults", e);
            let backup = path.with_extension("json.bak");
            let settings = Settings::default();
            if let Err(e) = fs::copy(&path, &backup) {
                // Without a copy the user's file is left in place.
                tracing::warn!("Failed to back up unreadable config: {}", e);
                return settings;
            }
            tracing::warn!("Config was unreadable, kept a copy at {:?}", backup);
            if let Err(e) = save_raw(&path, &settings) {
                tracing::warn!("{}", e);
            }
            settings
        }
    }
}

fn save_raw(path: &Path, settings: &Settings) -> Result<(), String> {
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to save config: {}", e))
}

fn normalize_settings(settings: &mut Settings) {
    settings.model = non_empty(Some(settings.model.clone())).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    settings.api_base = non_empty(Some(settings.api_base.clone()))
        .map(|base| base.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    settings.input_device_name = non_empty(settings.input_device_name.clone());
    settings.analysis_timeout_secs = settings.analysis_timeout_secs.max(1);
    settings.analysis_retries = settings.analysis_retries.min(MAX_ANALYSIS_RETRIES);
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn mask_api_key(api_key: &str) -> String {
    if api_key.len() <= 10 || !api_key.is_ascii() {
        return "******".to_string();
    }

    let prefix = &api_key[..6];
    let suffix = &api_key[api_key.len().saturating_sub(4)..];
    format!("{}********{}", prefix, suffix)
}
