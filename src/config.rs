use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Invalid(String),
}

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const API_BASE_ENV: &str = "REDRUN_API_BASE";
pub const DEFAULT_STATE_DIR: &str = ".redrun";
pub const SETTINGS_FILE_NAME: &str = "config.yaml";

const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;
const DEFAULT_STEP_DELAY_MS: u64 = 500;
const DEFAULT_MANUAL_POLL_MS: u64 = 1000;

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_state_root() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_STATE_DIR),
        None => PathBuf::from(DEFAULT_STATE_DIR),
    }
}

fn default_exec_timeout_secs() -> u64 {
    DEFAULT_EXEC_TIMEOUT_SECS
}

fn default_step_delay_ms() -> u64 {
    DEFAULT_STEP_DELAY_MS
}

fn default_manual_poll_ms() -> u64 {
    DEFAULT_MANUAL_POLL_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_manual_poll_ms")]
    pub manual_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            state_root: default_state_root(),
            exec_timeout_secs: default_exec_timeout_secs(),
            step_delay_ms: default_step_delay_ms(),
            manual_poll_ms: default_manual_poll_ms(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base.trim();
        if base.is_empty() {
            return Err(ConfigError::Invalid("api_base must be non-empty".to_string()));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "api_base `{base}` must start with http:// or https://"
            )));
        }
        if self.exec_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "exec_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.manual_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "manual_poll_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective API base: the environment override wins over the file.
    pub fn resolve_api_base(&self) -> String {
        std::env::var(API_BASE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.api_base.clone())
    }

    pub fn history_path(&self) -> PathBuf {
        self.state_root.join("history.json")
    }
}

/// Load settings from a YAML file; a missing file means defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings: Settings =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}
