use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::SemanticVersion;
use crate::error::{Result, StoreError};
use crate::store::DEFAULT_MAX_ATTEMPTS;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "semver-store.toml";

/// Which backend holds the version.
///
/// An empty or missing `driver` is [`DriverKind::Unspecified`], which the
/// factory treats as S3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Unspecified,
    S3,
    Git,
    Gcs,
}

impl FromStr for DriverKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(DriverKind::Unspecified),
            "s3" => Ok(DriverKind::S3),
            "git" => Ok(DriverKind::Git),
            "gcs" => Ok(DriverKind::Gcs),
            other => Err(StoreError::config(format!("unknown driver: {}", other))),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Unspecified => write!(f, "unspecified"),
            DriverKind::S3 => write!(f, "s3"),
            DriverKind::Git => write!(f, "git"),
            DriverKind::Gcs => write!(f, "gcs"),
        }
    }
}

/// Where the version lives and how to start it.
///
/// Read once when the store is built; the store never writes it back.
/// Only the fields of the selected driver are consulted.
#[derive(Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub driver: String,

    /// Version reported and bumped from while nothing is stored, default `0.0.0`
    #[serde(default)]
    pub initial_version: Option<String>,

    /// Attempts per bump/set before giving up, default 12
    #[serde(default)]
    pub max_attempts: Option<u32>,

    // s3 and gcs
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,

    // s3
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub disable_ssl: bool,
    #[serde(default)]
    pub server_side_encryption: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,

    // gcs
    #[serde(default)]
    pub access_token: Option<String>,

    // git
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub git_user: Option<String>,
}

impl Config {
    pub fn driver_kind(&self) -> Result<DriverKind> {
        self.driver.trim().parse()
    }

    /// The configured initial version, or `0.0.0`
    pub fn initial_version(&self) -> Result<SemanticVersion> {
        match self.initial_version.as_deref().map(str::trim) {
            None | Some("") => Ok(SemanticVersion::default()),
            Some(text) => SemanticVersion::parse(text).map_err(|e| {
                StoreError::config(format!("invalid initial version ({}): {}", text, e.reason))
            }),
        }
    }

    pub fn max_attempts(&self) -> Result<u32> {
        match self.max_attempts {
            None => Ok(DEFAULT_MAX_ATTEMPTS),
            Some(0) => Err(StoreError::config("max_attempts must be at least 1")),
            Some(n) => Ok(n),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |value: &Option<String>| value.as_ref().map(|_| "***");

        f.debug_struct("Config")
            .field("driver", &self.driver)
            .field("initial_version", &self.initial_version)
            .field("max_attempts", &self.max_attempts)
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .field("region_name", &self.region_name)
            .field("disable_ssl", &self.disable_ssl)
            .field("server_side_encryption", &self.server_side_encryption)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &secret(&self.secret_access_key))
            .field("session_token", &secret(&self.session_token))
            .field("access_token", &secret(&self.access_token))
            .field("uri", &self.uri)
            .field("branch", &self.branch)
            .field("file", &self.file)
            .field("private_key", &secret(&self.private_key))
            .field("username", &self.username)
            .field("password", &secret(&self.password))
            .field("git_user", &self.git_user)
            .finish()
    }
}

/// Parse a configuration from TOML text
pub fn parse_config(text: &str) -> Result<Config> {
    toml::from_str(text).map_err(|e| StoreError::config(format!("invalid configuration: {}", e)))
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `semver-store.toml` in current directory
/// 3. `semver-store.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(PathBuf::from(path)),
        None => discover_config(),
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };

    let text = fs::read_to_string(&path).map_err(|e| {
        StoreError::config(format!("cannot read {}: {}", path.display(), e))
    })?;

    parse_config(&text)
}

fn discover_config() -> Option<PathBuf> {
    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}
