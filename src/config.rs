//! TOML configuration.
//!
//! Every key has a default, so the tool runs without a config file. When the
//! file given by `--config` exists it is parsed and validated; a missing file
//! means "use the defaults".
//!
//! ```toml
//! [data]
//! path = "rncs.csv"
//! delimiter = ","
//!
//! [source]
//! url = "https://dgii.gov.do/app/WebApps/Consultas/RNC/RNC_CONTRIBUYENTES.zip"
//! entry_suffix = ".csv"
//! timeout_secs = 60
//!
//! [server]
//! bind = "0.0.0.0:9922"
//! # reload_token = "change-me"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::parse::RecordParser;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("rncs.csv")
}
fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_entry_suffix")]
    pub entry_suffix: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            entry_suffix: default_entry_suffix(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_url() -> String {
    "https://dgii.gov.do/app/WebApps/Consultas/RNC/RNC_CONTRIBUYENTES.zip".to_string()
}
fn default_entry_suffix() -> String {
    ".csv".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36"
        .to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required by `POST /api/reload` when set.
    #[serde(default)]
    pub reload_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            reload_token: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:9922".to_string()
}

impl SourceConfig {
    /// Download timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DataConfig {
    /// The validated delimiter as a single byte.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// A parser using the configured delimiter.
    pub fn parser(&self) -> RecordParser {
        RecordParser::new(self.delimiter_byte())
    }
}

impl ServerConfig {
    /// Bind address with the port replaced by `port`, if given.
    pub fn bind_addr(&self, port: Option<u16>) -> Result<SocketAddr> {
        let mut addr: SocketAddr = self
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.bind))?;
        if let Some(port) = port {
            addr.set_port(port);
        }
        Ok(addr)
    }
}

/// Loads `path` if it exists, otherwise returns the defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let delim = config.data.delimiter.as_bytes();
    if delim.len() != 1 || !delim[0].is_ascii() {
        bail!(
            "data.delimiter must be a single ASCII character, got '{}'",
            config.data.delimiter
        );
    }

    if config.source.timeout_secs == 0 {
        bail!("source.timeout_secs must be > 0");
    }

    if config.source.entry_suffix.trim().is_empty() {
        bail!("source.entry_suffix must not be empty");
    }

    if !(config.source.url.starts_with("http://") || config.source.url.starts_with("https://")) {
        bail!("source.url must be an http(s) URL: '{}'", config.source.url);
    }

    config.server.bind_addr(None)?;

    Ok(())
}
