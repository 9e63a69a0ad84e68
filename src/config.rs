//! Client configuration.
//!
//! Sources, in the order the CLI tries them: an explicit TOML file, the
//! platform config directory, then environment variables. Library users
//! can also construct [`Config`] directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PaprikaError, Result};

/// The vendor's production API host.
pub const DEFAULT_DOMAIN: &str = "www.paprikaapp.com";

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the Paprika cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// API host. A bare host gets `https://` prepended; a full
    /// `http(s)://` URL is used as-is.
    pub domain: String,
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,
    /// Explicit User-Agent. `None` enables platform auto-detection.
    pub user_agent: Option<String>,
    /// Which cache backs recipe resolution.
    pub cache: CacheChoice,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            domain: DEFAULT_DOMAIN.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            cache: CacheChoice::default(),
        }
    }
}

/// Cache selection. Disabled by default: every resolution then goes to the
/// network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheChoice {
    /// No caching.
    #[default]
    Disabled,
    /// Persistent SQLite cache at the given path.
    Sqlite {
        /// Database file location.
        path: PathBuf,
    },
}

impl Config {
    /// Config for the production host with the given credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|err| PaprikaError::Config(format!("{}: {err}", path.display())))
    }

    /// Build from `PAPRIKA_*` environment variables.
    ///
    /// `PAPRIKA_EMAIL` and `PAPRIKA_PASSWORD` are required; `PAPRIKA_DOMAIN`,
    /// `PAPRIKA_TIMEOUT_SECS`, `PAPRIKA_USER_AGENT`, and `PAPRIKA_CACHE_PATH`
    /// override their defaults. Returns `None` when the credentials are
    /// missing or empty.
    pub fn from_env() -> Option<Self> {
        let email = std::env::var("PAPRIKA_EMAIL").ok()?;
        let password = std::env::var("PAPRIKA_PASSWORD").ok()?;
        if email.is_empty() || password.is_empty() {
            return None;
        }

        let mut config = Self::new(email, password);
        if let Ok(domain) = std::env::var("PAPRIKA_DOMAIN") {
            config.domain = domain;
        }
        if let Some(timeout) = std::env::var("PAPRIKA_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            config.timeout_secs = timeout;
        }
        if let Ok(agent) = std::env::var("PAPRIKA_USER_AGENT") {
            config.user_agent = Some(agent);
        }
        if let Ok(path) = std::env::var("PAPRIKA_CACHE_PATH") {
            config.cache = CacheChoice::Sqlite { path: path.into() };
        }

        Some(config)
    }

    /// The platform config file location, e.g.
    /// `~/.config/paprika-sync/config.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "paprika-sync")?;
        Some(dirs.config_dir().join("config.toml"))
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
