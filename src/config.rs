//! Configuration management for synoptic.
//!
//! Settings are layered with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SynopticError};
use crate::loader::remote::{ThreddsConfig, DEFAULT_URL_TEMPLATE};
use crate::render::{Projection, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Command-line arguments for synoptic
#[derive(Parser, Debug, Default)]
#[command(name = "synoptic")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "SYNOPTIC_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SYNOPTIC_PORT")]
    pub port: Option<u16>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "SYNOPTIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SYNOPTIC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for downloaded reanalysis subsets
    #[arg(long, env = "SYNOPTIC_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Serve reanalysis fields from a local yearly-file archive instead of THREDDS
    #[arg(long, env = "SYNOPTIC_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Root of the converted ECMWF EFI archive
    #[arg(long, env = "SYNOPTIC_EFI_DIR")]
    pub efi_dir: Option<PathBuf>,

    /// Staging directory for EFI files
    #[arg(long, env = "SYNOPTIC_EFI_TEMP_DIR")]
    pub efi_temp_dir: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where reanalysis fields come from and how long downloads are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// THREDDS base URLs, tried in order
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,

    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Timeout of one HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout of one variable-code fetch, download and decode included
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cached subsets older than this are deleted
    #[serde(default = "default_retention_days")]
    pub cache_retention_days: u64,

    /// Local `{year}/{code}.{year}.0p5.anl.nc` archive; replaces THREDDS when set
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfiConfig {
    #[serde(default = "default_efi_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_efi_temp_dir")]
    pub temp_dir: PathBuf,

    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

/// Raster output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Map area width in pixels, colourbar strip excluded
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// `miller` or `platecarree`
    #[serde(default = "default_projection")]
    pub projection: String,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub efi: EfiConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Build the configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = &args.config {
            let file_config = Self::load_from_file(config_path)?;
            config.merge(file_config);
        }

        config.apply_args(args);
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SynopticError::Config {
            message: format!("Cannot read config file {}: {}", path.display(), e),
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server = other.server;
        self.loader = other.loader;
        self.efi = other.efi;
        self.render = other.render;
        self.log_level = other.log_level;
    }

    fn apply_args(&mut self, args: Args) {
        if let Some(host) = args.host {
            self.server.host = host;
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = args.log_level {
            self.log_level = level;
        }
        if let Some(dir) = args.cache_dir {
            self.loader.cache_dir = dir;
        }
        if args.archive_dir.is_some() {
            self.loader.archive_dir = args.archive_dir;
        }
        if let Some(dir) = args.efi_dir {
            self.efi.data_dir = dir;
        }
        if let Some(dir) = args.efi_temp_dir {
            self.efi.temp_dir = dir;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(config_error("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(config_error("Server port cannot be 0"));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(config_error(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                )));
            }
        }

        if self.loader.archive_dir.is_none() {
            if self.loader.mirrors.is_empty() {
                return Err(config_error("At least one THREDDS mirror is required"));
            }
            if let Some(bad) = self
                .loader
                .mirrors
                .iter()
                .find(|m| !(m.starts_with("http://") || m.starts_with("https://")))
            {
                return Err(config_error(format!("Mirror is not an http(s) URL: {}", bad)));
            }
            for placeholder in ["{mirror}", "{year}", "{code}"] {
                if !self.loader.url_template.contains(placeholder) {
                    return Err(config_error(format!(
                        "URL template is missing the {} placeholder",
                        placeholder
                    )));
                }
            }
        }

        if self.loader.request_timeout_secs == 0 || self.loader.fetch_timeout_secs == 0 {
            return Err(config_error("Timeouts must be at least one second"));
        }

        if self.loader.cache_retention_days == 0 || self.efi.retention_days == 0 {
            return Err(config_error("Retention must be at least one day"));
        }

        if !(100..=4000).contains(&self.render.width) || !(100..=4000).contains(&self.render.height) {
            return Err(config_error(format!(
                "Image size {}x{} is outside 100..=4000 pixels",
                self.render.width, self.render.height
            )));
        }

        self.projection()?;
        Ok(())
    }

    /// The parsed map projection
    pub fn projection(&self) -> Result<Projection> {
        Projection::parse(&self.render.projection)
            .ok_or_else(|| config_error(format!("Unknown projection: {}", self.render.projection)))
    }

    pub fn thredds(&self) -> ThreddsConfig {
        ThreddsConfig {
            mirrors: self.loader.mirrors.clone(),
            url_template: self.loader.url_template.clone(),
            request_timeout: Duration::from_secs(self.loader.request_timeout_secs),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.loader.fetch_timeout_secs)
    }

    pub fn cache_retention(&self) -> Duration {
        days(self.loader.cache_retention_days)
    }

    pub fn efi_retention(&self) -> Duration {
        days(self.efi.retention_days)
    }
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}

fn config_error(message: impl Into<String>) -> SynopticError {
    SynopticError::Config {
        message: message.into(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            loader: LoaderConfig::default(),
            efi: EfiConfig::default(),
            render: RenderConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            url_template: default_url_template(),
            request_timeout_secs: default_request_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            cache_dir: default_cache_dir(),
            cache_retention_days: default_retention_days(),
            archive_dir: None,
        }
    }
}

impl Default for EfiConfig {
    fn default() -> Self {
        Self {
            data_dir: default_efi_dir(),
            temp_dir: default_efi_temp_dir(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            projection: default_projection(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_mirrors() -> Vec<String> {
    vec![
        "http://thredds.atmos.albany.edu:8080/thredds".to_string(),
        "http://thredds2.atmos.albany.edu:8080/thredds".to_string(),
    ]
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    120
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("synoptic").join("cfsr")
}

fn default_retention_days() -> u64 {
    7
}

fn default_efi_dir() -> PathBuf {
    PathBuf::from("data/efi")
}

fn default_efi_temp_dir() -> PathBuf {
    std::env::temp_dir().join("synoptic").join("efi")
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_projection() -> String {
    "miller".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
