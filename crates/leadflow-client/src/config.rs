//! Client configuration, resolved per key as: explicit override, then
//! `LEADFLOW_*` environment variable, then the TOML config file, then default.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid {key} '{value}': {message}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        message: String,
    },
    #[error("unknown sync mode '{0}' (expected polling, push or off)")]
    InvalidSyncMode(String),
    #[error("invalid number for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub session_path: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub sync: SyncFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SyncFileConfig {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

/// Values supplied on the command line; empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub session_path: Option<String>,
    pub sync_mode: Option<String>,
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Polling,
    Push,
    Off,
}

impl SyncMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "polling" | "poll" => Ok(SyncMode::Polling),
            "push" | "ws" | "websocket" => Ok(SyncMode::Push),
            "off" | "none" | "disabled" => Ok(SyncMode::Off),
            other => Err(ConfigError::InvalidSyncMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Polling => "polling",
            SyncMode::Push => "push",
            SyncMode::Off => "off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub mode: SyncMode,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub ws_url: Url,
    pub session_path: PathBuf,
    pub request_timeout: Duration,
    pub sync: SyncSettings,
    pub log_dir: String,
    pub log_level: String,
}

impl ClientConfig {
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let path = overrides.config_path.clone().unwrap_or_else(config_path);
        let file = load_file_config(&path)?;
        Self::resolve_with(overrides, &file, |key| env::var(key).ok())
    }

    pub fn resolve_with<F>(
        overrides: &ConfigOverrides,
        file: &FileConfig,
        env_lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |flag: &Option<String>,
                    key: &str,
                    from_file: &Option<String>|
         -> Option<String> {
            non_empty(flag.clone())
                .or_else(|| non_empty(env_lookup(key)))
                .or_else(|| non_empty(from_file.clone()))
        };

        let api_raw = pick(&overrides.api_url, "LEADFLOW_API_URL", &file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_url("api_url", &api_raw)?;

        let ws_url = match pick(&overrides.ws_url, "LEADFLOW_WS_URL", &file.ws_url) {
            Some(raw) => parse_url("ws_url", &raw)?,
            None => derive_ws_url(&api_url)?,
        };

        let session_path = pick(
            &overrides.session_path,
            "LEADFLOW_SESSION_PATH",
            &file.session_path,
        )
        .map(PathBuf::from)
        .unwrap_or_else(default_session_path);

        let request_timeout_secs = match non_empty(env_lookup("LEADFLOW_REQUEST_TIMEOUT_SECS")) {
            Some(raw) => parse_secs("request_timeout_secs", &raw)?,
            None => file
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let mode = match pick(&overrides.sync_mode, "LEADFLOW_SYNC_MODE", &file.sync.mode) {
            Some(raw) => SyncMode::parse(&raw)?,
            None => SyncMode::Polling,
        };
        let poll_interval_secs = match non_empty(env_lookup("LEADFLOW_POLL_INTERVAL_SECS")) {
            Some(raw) => parse_secs("poll_interval_secs", &raw)?,
            None => file
                .sync
                .poll_interval_secs
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };

        let log_dir = pick(&overrides.log_dir, "LEADFLOW_LOG_DIR", &file.log_dir)
            .unwrap_or_default();
        let log_level = pick(&None, "LEADFLOW_LOG_LEVEL", &file.log_level)
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            api_url,
            ws_url,
            session_path,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            sync: SyncSettings {
                mode,
                poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            },
            log_dir,
            log_level,
        })
    }
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("LEADFLOW_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    config_dir().join("leadflow/config.toml")
}

fn default_session_path() -> PathBuf {
    config_dir().join("leadflow/session.json")
}

fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"))
}

/// `http(s)://host/prefix` becomes `ws(s)://host/ws`.
fn derive_ws_url(api_url: &Url) -> Result<Url, ConfigError> {
    let mut ws = api_url.clone();
    let scheme = if api_url.scheme() == "https" { "wss" } else { "ws" };
    ws.set_scheme(scheme)
        .map_err(|_| ConfigError::InvalidUrl {
            key: "ws_url",
            value: api_url.to_string(),
            message: "cannot derive websocket scheme".to_string(),
        })?;
    ws.set_path("/ws");
    ws.set_query(None);
    Ok(ws)
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidUrl {
        key,
        value: raw.to_string(),
        message: err.to_string(),
    })
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
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
