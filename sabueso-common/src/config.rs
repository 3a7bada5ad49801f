//! Configuration loading for sabueso
//!
//! Two sources feed a run:
//! 1. **TOML config**: tables, directories, model inputs and logging
//! 2. **Credentials JSON**: record store connection parameters, kept out of the
//!    TOML file so it can be shared without secrets
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SABUESO_CONFIG`)
//! 3. `<config_dir>/sabueso/config.toml`
//! 4. Built-in defaults (missing file is not an error)

use crate::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "SABUESO_CONFIG";

/// Pipeline configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// JSON file holding [`ConnectionParams`]
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Table holding image URLs (id, url, parent id)
    #[serde(default = "default_image_table")]
    pub image_table: String,

    /// Table holding cleaned/derived records
    #[serde(default = "default_clean_table")]
    pub clean_table: String,

    /// Table holding tweet records (id at position 0, grouping id at position 3)
    #[serde(default = "default_tweet_table")]
    pub tweet_table: String,

    /// Column receiving the comma-joined labels
    #[serde(default = "default_label_column")]
    pub label_column: String,

    /// Directory images are downloaded into
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// URL prefix stripped when deriving local file names
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// Class index JSON (stringified index -> [code, name])
    #[serde(default = "default_class_index_path")]
    pub class_index_path: PathBuf,

    /// Pretrained model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Number of labels kept per image
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Model input height in pixels
    #[serde(default = "default_image_side")]
    pub image_height: u32,

    /// Model input width in pixels
    #[serde(default = "default_image_side")]
    pub image_width: u32,

    /// Input normalization convention of the model
    #[serde(default)]
    pub normalization: Normalization,

    /// Feed the model `[K, 3, H, W]` instead of `[K, H, W, 3]`
    #[serde(default)]
    pub channels_first: bool,

    /// Commit label updates (false = dry run, changes rolled back)
    #[serde(default)]
    pub commit: bool,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Pixel normalization applied after resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB -> BGR, subtract the ImageNet channel means, no scaling (ResNet50)
    #[default]
    Caffe,
    /// Scale to [0, 1], subtract mean and divide by std per channel
    Torch,
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_image_table() -> String {
    "sabueso_img".to_string()
}

fn default_clean_table() -> String {
    "sabueso_clean".to_string()
}

fn default_tweet_table() -> String {
    "sabueso_tweet".to_string()
}

fn default_label_column() -> String {
    "labels".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("input/download/")
}

fn default_url_prefix() -> String {
    "http://pbs.twimg.com/media/".to_string()
}

fn default_class_index_path() -> PathBuf {
    PathBuf::from("input/restnet50/imagenet_class_index.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("input/restnet50/resnet50.onnx")
}

fn default_top_n() -> usize {
    3
}

fn default_image_side() -> u32 {
    224
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            image_table: default_image_table(),
            clean_table: default_clean_table(),
            tweet_table: default_tweet_table(),
            label_column: default_label_column(),
            download_dir: default_download_dir(),
            url_prefix: default_url_prefix(),
            class_index_path: default_class_index_path(),
            model_path: default_model_path(),
            top_n: default_top_n(),
            image_height: default_image_side(),
            image_width: default_image_side(),
            normalization: Normalization::default(),
            channels_first: false,
            commit: false,
            http_timeout_secs: default_http_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }
        if self.image_height == 0 || self.image_width == 0 {
            return Err(Error::Config(format!(
                "image size must be non-zero, got {}x{}",
                self.image_height, self.image_width
            )));
        }
        Ok(())
    }
}

/// Resolve which config file to read, if any
///
/// An explicit CLI or environment path is returned even if it does not exist,
/// so the caller reports it instead of silently falling back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/sabueso/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sabueso").join("config.toml"))
}

/// Load configuration following the priority order, falling back to defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = TomlConfig::from_file(&path)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Record store connection parameters
///
/// Accepts the same keys as a libpq keyword connection (`host`, `port`,
/// `user`, `password`, `dbname`/`database`) or a complete `url`, which wins
/// when present.
#[derive(Clone, Deserialize)]
pub struct ConnectionParams {
    /// Full connection URL (e.g. `postgres://...` or `sqlite://...`)
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_pg_port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, alias = "database")]
    pub dbname: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl ConnectionParams {
    /// Connection parameters for a complete URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            host: default_host(),
            port: default_pg_port(),
            user: None,
            password: None,
            dbname: None,
        }
    }

    /// Read parameters from a JSON credentials file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read credentials {} failed: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Parse credentials {} failed: {}", path.display(), e))
        })
    }

    /// Connection URL understood by the database driver
    ///
    /// A host starting with `/` is a unix socket directory and travels as the
    /// `host` query parameter, the way libpq URLs carry it.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let invalid = |what: &str| Error::Config(format!("invalid {} in credentials", what));
        let mut url = Url::parse("postgres://localhost").map_err(|e| Error::Config(e.to_string()))?;

        if self.host.starts_with('/') {
            url.query_pairs_mut().append_pair("host", &self.host);
        } else if let Ok(ip) = self.host.parse::<IpAddr>() {
            url.set_ip_host(ip).map_err(|_| invalid("host"))?;
        } else {
            url.set_host(Some(&self.host)).map_err(|_| invalid("host"))?;
        }
        url.set_port(Some(self.port)).map_err(|_| invalid("port"))?;

        if let Some(user) = &self.user {
            url.set_username(user).map_err(|_| invalid("user"))?;
            if let Some(password) = &self.password {
                url.set_password(Some(password)).map_err(|_| invalid("password"))?;
            }
        }
        if let Some(dbname) = &self.dbname {
            url.path_segments_mut()
                .map_err(|_| invalid("dbname"))?
                .push(dbname);
        }

        Ok(url.into())
    }
}

// Password must never reach the logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("url", &self.url.as_ref().map(|_| "<set>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("dbname", &self.dbname)
            .finish()
    }
}
