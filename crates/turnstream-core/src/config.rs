use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const ENDPOINT_ENV: &str = "TURNSTREAM_ENDPOINT";
pub const IDLE_TIMEOUT_ENV: &str = "TURNSTREAM_IDLE_TIMEOUT_SECS";

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    /// Agent endpoint that accepts run requests. Falls back to
    /// [`DEFAULT_ENDPOINT`] when unset.
    pub endpoint: Option<String>,

    #[serde(default)]
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Longest gap allowed between two events; `0` disables the check.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Extra headers sent with every run request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

impl TransportSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl ClientConfig {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::Configuration("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("turnstream").join("config.toml"))
    }

    /// Load the config from its default location, or return defaults if
    /// not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`. A file that fails to parse is reported and
    /// replaced by defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        match Self::parse(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    target: "turnstream::config",
                    "Failed to parse config file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Overlay `TURNSTREAM_*` environment variables.
    pub fn with_env_overrides(self) -> Self {
        let endpoint_env = std::env::var(ENDPOINT_ENV).ok();
        let idle_env = std::env::var(IDLE_TIMEOUT_ENV).ok();

        self.with_overrides(endpoint_env.as_deref(), idle_env.as_deref())
    }

    /// Blank values and unparseable numbers leave the current setting alone.
    pub fn with_overrides(mut self, endpoint: Option<&str>, idle_timeout_secs: Option<&str>) -> Self {
        if let Some(endpoint) = endpoint.map(str::trim).filter(|value| !value.is_empty()) {
            self.endpoint = Some(endpoint.to_string());
        }

        if let Some(raw) = idle_timeout_secs {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.transport.idle_timeout_secs = secs,
                Err(_) => tracing::warn!(
                    target: "turnstream::config",
                    value = raw,
                    "Ignoring non-numeric {IDLE_TIMEOUT_ENV}"
                ),
            }
        }

        self
    }

    pub fn endpoint_url(&self) -> std::result::Result<Url, String> {
        let raw = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let url = Url::parse(raw).map_err(|e| format!("{raw}: {e}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(format!("{raw}: unsupported scheme {other}")),
        }
    }
}
