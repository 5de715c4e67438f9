use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

const CREDENTIALS_TEMPLATE: &str = "\
# AniList API credentials
ID = \"\"
SECRET = \"\"
REDIRECT = \"http://localhost\"
ACCESS_TOKEN = \"\"
";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub sync: SyncConfig,
    pub anilist: AniListConfig,
}

/// How to reach the player and how often to poll it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Unix socket path, or `tcp://host:port`.
    pub endpoint: String,
    pub wait_interval_ms: u64,
    pub connect_attempts: u32,
    pub connect_retry_ms: u64,
    pub read_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub threshold_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AniListConfig {
    pub api_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
}

impl PlayerConfig {
    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AniListConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load `config.toml` from `dir`, merged over the built-in defaults.
    ///
    /// A missing file is not an error; keys absent from the user file keep
    /// their default values.
    pub fn load(dir: &Path) -> Result<Self, CoreError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No user config, using defaults");
            return Ok(Self::default());
        }
        let user_str = std::fs::read_to_string(&path)?;
        Self::from_toml_over_defaults(&user_str)
    }

    /// Parse a (possibly partial) TOML document over the built-in defaults.
    pub fn from_toml_over_defaults(user_str: &str) -> Result<Self, CoreError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| CoreError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(user_str).map_err(|e| CoreError::Config(e.to_string()))?;
        merge_tables(&mut merged, user);
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| CoreError::Config(e.to_string()))
    }

    /// Per-user config directory (XDG on Linux, AppData on Windows).
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Self::project_dirs()
            .map(|d| d.config_dir().to_path_buf())
            .ok_or(CoreError::NoConfigDir)
    }

    /// Directory for log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn credentials_path(dir: &Path) -> PathBuf {
        dir.join(CREDENTIALS_FILE)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "ani-cli-tracker")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// AniList OAuth client settings and the bearer token obtained with them.
///
/// Empty values are treated as absent.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ID", default)]
    pub client_id: String,
    #[serde(rename = "SECRET", default)]
    pub client_secret: String,
    #[serde(rename = "REDIRECT", default)]
    pub redirect_uri: String,
    #[serde(rename = "ACCESS_TOKEN", default)]
    pub access_token: String,
}

impl Credentials {
    /// Load the credentials file. A missing file is reported as
    /// [`CoreError::MissingCredentials`] so the caller can bootstrap it.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::MissingCredentials(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }

    /// Write a blank credentials template, creating parent directories.
    pub fn bootstrap(path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, CREDENTIALS_TEMPLATE)?;
        tracing::info!(path = %path.display(), "Created credentials template");
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, format!("# AniList API credentials\n{body}"))?;
        Ok(())
    }

    pub fn bearer_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn client_id(&self) -> Option<&str> {
        non_empty(&self.client_id)
    }

    pub fn client_secret(&self) -> Option<&str> {
        non_empty(&self.client_secret)
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        non_empty(&self.redirect_uri)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &redacted(&self.access_token))
            .finish()
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn redacted(s: &str) -> &'static str {
    if s.trim().is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}
